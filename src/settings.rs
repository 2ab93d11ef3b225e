//! Gameplay tuning
//!
//! Loaded from a JSON file next to the binary; any missing field takes its
//! default, so partial files are fine.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::sim::merge::MergeConfig;
use crate::sim::spawner::SpawnerConfig;

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Pieces ===
    /// Speed cap for free dynamic pieces
    pub max_velocity: f32,
    /// Out-of-plane depth every piece is held at
    pub depth_reference: f32,
    /// Instances pre-allocated per tier
    pub warmup_per_tier: usize,

    // === Merging ===
    /// Simulation seconds between merge queue drains
    pub merge_delay: f32,
    /// Offset from the pair midpoint where the merged piece appears
    pub spawn_offset: Vec2,
    /// Fraction of the averaged velocity the merged piece keeps
    pub merge_velocity_damping: f32,

    // === Fail zone ===
    /// Seconds a piece may stay in the fail zone
    pub grace_time: f32,

    // === Spawner ===
    pub spawn_y: f32,
    pub preview_offset_y: f32,
    pub min_x: f32,
    pub max_x: f32,
    pub drop_jitter: f32,
    /// Seconds before the next preview appears after a drop
    pub respawn_delay: f32,

    // === Score ===
    /// Store key holding the high score
    pub high_score_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_velocity: MAX_VELOCITY,
            depth_reference: 0.0,
            warmup_per_tier: WARMUP_PER_TIER,

            merge_delay: MERGE_DELAY,
            spawn_offset: MERGE_SPAWN_OFFSET,
            merge_velocity_damping: MERGE_VELOCITY_DAMPING,

            grace_time: FAIL_GRACE_TIME,

            spawn_y: SPAWN_Y,
            preview_offset_y: PREVIEW_OFFSET_Y,
            min_x: MIN_DROP_X,
            max_x: MAX_DROP_X,
            drop_jitter: DROP_JITTER,
            respawn_delay: RESPAWN_DELAY,

            high_score_key: HIGH_SCORE_KEY.to_string(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from `path`, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(err) => {
                    log::warn!("Ignoring {}: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!("No settings at {} ({}), using defaults", path.display(), err);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            merge_delay: self.merge_delay,
            spawn_offset: self.spawn_offset,
            velocity_damping: self.merge_velocity_damping,
        }
    }

    pub fn spawner_config(&self) -> SpawnerConfig {
        // A reversed range would make clamp panic
        let (min_x, max_x) = if self.min_x <= self.max_x {
            (self.min_x, self.max_x)
        } else {
            (self.max_x, self.min_x)
        };
        SpawnerConfig {
            spawn_y: self.spawn_y,
            preview_offset_y: self.preview_offset_y,
            min_x,
            max_x,
            drop_jitter: self.drop_jitter.abs(),
            respawn_delay: self.respawn_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "grace_time": 2.5, "max_x": 4.0 }"#).unwrap();
        assert_eq!(settings.grace_time, 2.5);
        assert_eq!(settings.max_x, 4.0);
        assert_eq!(settings.merge_delay, MERGE_DELAY);
        assert_eq!(settings.high_score_key, HIGH_SCORE_KEY);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            Settings::from_json("{ grace_time: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let settings = Settings::load("/definitely/not/here/settings.json");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!("fruit-merge-settings-{}.json", std::process::id()));
        let settings = Settings {
            respawn_delay: 0.5,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_spawner_config_orders_bounds() {
        let settings = Settings {
            min_x: 3.0,
            max_x: -3.0,
            drop_jitter: -0.1,
            ..Default::default()
        };
        let config = settings.spawner_config();
        assert_eq!((config.min_x, config.max_x), (-3.0, 3.0));
        assert_eq!(config.drop_jitter, 0.1);
    }
}
