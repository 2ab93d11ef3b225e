//! Tier catalog
//!
//! Immutable table of piece tiers, loaded once. Tier ids are dense and 0-based
//! so they double as array indices throughout the simulation.

use std::path::Path;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::piece::ColliderShape;
use crate::error::ConfigError;

/// Dense tier index
pub type TierId = u32;

fn default_collider_radius() -> f32 {
    0.5
}

fn default_max_spawn_tier() -> TierId {
    2
}

/// Bounds of the visual asset a tier is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualParams {
    /// Unscaled sprite size
    pub sprite_size: Vec2,
    /// Sprite pivot relative to its bounds center
    #[serde(default)]
    pub sprite_center: Vec2,
}

/// One tier of the merge chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub id: TierId,
    pub name: String,
    /// Tier produced by merging two of this tier (None = max tier)
    #[serde(default)]
    pub next_tier: Option<TierId>,
    /// Points awarded when this tier is produced by a merge
    pub score_value: u32,
    /// Collider size ratio relative to the visual bounds
    #[serde(default = "default_collider_radius")]
    pub collider_radius: f32,
    /// Visual template; a tier without one cannot be instantiated
    #[serde(default)]
    pub visual: Option<VisualParams>,
    /// Collider declared by the template; zero-sized shapes are fitted on spawn
    #[serde(default)]
    pub collider: ColliderShape,
}

impl TierDefinition {
    pub fn new(id: TierId, name: impl Into<String>, score_value: u32) -> Self {
        Self {
            id,
            name: name.into(),
            next_tier: None,
            score_value,
            collider_radius: default_collider_radius(),
            visual: Some(VisualParams {
                sprite_size: Vec2::ONE,
                sprite_center: Vec2::ZERO,
            }),
            collider: ColliderShape::default(),
        }
    }

    pub fn with_next(mut self, next: TierId) -> Self {
        self.next_tier = Some(next);
        self
    }

    pub fn with_collider_radius(mut self, ratio: f32) -> Self {
        self.collider_radius = ratio;
        self
    }

    pub fn with_collider(mut self, collider: ColliderShape) -> Self {
        self.collider = collider;
        self
    }

    pub fn without_visual(mut self) -> Self {
        self.visual = None;
        self
    }

    /// Whether instances of this tier can be created
    #[inline]
    pub fn has_template(&self) -> bool {
        self.visual.is_some()
    }

    #[inline]
    pub fn is_max_tier(&self) -> bool {
        self.next_tier.is_none()
    }
}

impl std::fmt::Display for TierDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ID:{})", self.name, self.id)
    }
}

/// The full tier table plus the spawnable subrange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierCatalog {
    tiers: Vec<TierDefinition>,
    /// Highest tier id the spawn queue may draw (inclusive)
    #[serde(default = "default_max_spawn_tier")]
    max_spawn_tier: TierId,
}

impl TierCatalog {
    /// Build a catalog, logging every configuration problem found
    pub fn new(tiers: Vec<TierDefinition>, max_spawn_tier: TierId) -> Self {
        let catalog = Self {
            tiers,
            max_spawn_tier,
        };
        catalog.log_problems();
        catalog
    }

    /// The eleven-tier fruit chain, cherry through watermelon
    pub fn classic() -> Self {
        const FRUITS: [(&str, u32, f32); 11] = [
            ("Cherry", 1, 0.12),
            ("Strawberry", 3, 0.16),
            ("Grape", 6, 0.2),
            ("Dekopon", 10, 0.24),
            ("Persimmon", 15, 0.3),
            ("Apple", 21, 0.36),
            ("Pear", 28, 0.42),
            ("Peach", 36, 0.5),
            ("Pineapple", 45, 0.6),
            ("Melon", 55, 0.75),
            ("Watermelon", 66, 0.9),
        ];

        let last = FRUITS.len() as TierId - 1;
        let tiers = FRUITS
            .iter()
            .enumerate()
            .map(|(i, &(name, score, ratio))| {
                let id = i as TierId;
                let tier = TierDefinition::new(id, name, score).with_collider_radius(ratio);
                if id < last { tier.with_next(id + 1) } else { tier }
            })
            .collect();

        Self::new(tiers, 4)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        if catalog.tiers.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        catalog.log_problems();
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        log::info!(
            "Loaded {} tiers from {} (spawnable 0..={})",
            catalog.len(),
            path.display(),
            catalog.max_spawn_tier
        );
        Ok(catalog)
    }

    pub fn tiers(&self) -> &[TierDefinition] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn max_spawn_tier(&self) -> TierId {
        self.max_spawn_tier
    }

    /// Highest tier id in the table
    pub fn max_tier(&self) -> Option<TierId> {
        self.tiers.iter().map(|t| t.id).max()
    }

    /// Look up a tier by id
    pub fn tier(&self, id: TierId) -> Option<&TierDefinition> {
        match self.tiers.get(id as usize) {
            Some(tier) if tier.id == id => Some(tier),
            // Misnumbered tables still resolve, just slower
            _ => self.tiers.iter().find(|t| t.id == id),
        }
    }

    /// The configured successor of `tier`; None for the terminal tier
    pub fn next_tier(&self, tier: &TierDefinition) -> Option<&TierDefinition> {
        let next_id = tier.next_tier?;
        let next = self.tier(next_id);
        if next.is_none() {
            log::error!("{} links to missing tier {}", tier, next_id);
        }
        next
    }

    /// Uniform pick among templated tiers in `0..=max_spawn_tier`
    ///
    /// An empty range is a configuration error: it is logged and the first
    /// templated tier anywhere in the catalog is returned instead. Returns
    /// None only when no tier has a template at all.
    pub fn random_spawnable_tier<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&TierDefinition> {
        let candidates: Vec<&TierDefinition> = self
            .tiers
            .iter()
            .filter(|t| t.id <= self.max_spawn_tier && t.has_template())
            .collect();

        if candidates.is_empty() {
            log::error!(
                "{} (catalog has {} tiers)",
                ConfigError::EmptySpawnRange {
                    max_spawn_tier: self.max_spawn_tier
                },
                self.tiers.len()
            );
            let fallback = self.tiers.iter().find(|t| t.has_template());
            if let Some(tier) = fallback {
                log::warn!("Falling back to {}", tier);
            }
            return fallback;
        }

        let pick = candidates[rng.random_range(0..candidates.len())];
        log::debug!("Spawn queue drew {}", pick);
        Some(pick)
    }

    /// Random tier with id in `min..=max`, both clamped to the catalog bounds
    pub fn random_tier_in_range<R: Rng + ?Sized>(
        &self,
        min: TierId,
        max: TierId,
        rng: &mut R,
    ) -> Option<&TierDefinition> {
        let last = self.tiers.len().checked_sub(1)? as TierId;
        let min = min.min(last);
        let max = max.min(last).max(min);
        self.tier(rng.random_range(min..=max))
    }

    /// Every configuration problem in the table
    ///
    /// Problems are warnings: the catalog stays usable and the affected
    /// lookups degrade (missing links end the chain, missing templates fail
    /// their acquire).
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut problems = Vec::new();

        if self.tiers.is_empty() {
            problems.push(ConfigError::EmptyCatalog);
            return problems;
        }

        for (index, tier) in self.tiers.iter().enumerate() {
            if tier.id as usize != index {
                problems.push(ConfigError::IdIndexMismatch { index, id: tier.id });
            }
            if let Some(next) = tier.next_tier {
                if next <= tier.id {
                    problems.push(ConfigError::NonIncreasingChain {
                        tier: tier.id,
                        next,
                    });
                } else if self.tier(next).is_none() {
                    problems.push(ConfigError::DanglingNextTier {
                        tier: tier.id,
                        next,
                    });
                }
            }
        }

        let spawnable = self
            .tiers
            .iter()
            .any(|t| t.id <= self.max_spawn_tier && t.has_template());
        if !spawnable {
            problems.push(ConfigError::EmptySpawnRange {
                max_spawn_tier: self.max_spawn_tier,
            });
        }

        problems
    }

    fn log_problems(&self) {
        for problem in self.validate() {
            log::warn!("Tier catalog: {}", problem);
        }
    }
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::classic()
    }
}
