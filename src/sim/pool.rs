//! Object pool for piece instances
//!
//! Arena layout: every instance ever allocated lives in one `Vec<Piece>` and
//! is addressed by slot. Each tier owns a free queue and an active set of
//! slots, keyed by tier id. A live instance sits in exactly one of the two.
//! The pool never shrinks; instances are reused for the process lifetime.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crossbeam_channel::Sender;
use glam::Vec2;

use super::catalog::{TierDefinition, TierId};
use super::merge::MergeCandidate;
use super::piece::{Piece, PieceHandle};
use crate::error::ConfigError;

#[derive(Debug, Default)]
struct TierSlots {
    free: VecDeque<u32>,
    active: BTreeSet<u32>,
}

/// Per-tier recycling of piece instances
#[derive(Debug)]
pub struct ObjectPool {
    pieces: Vec<Piece>,
    /// Slots discarded after an invalid release; never handed out again
    retired: BTreeSet<u32>,
    /// Only tiers that were ever pooled; ids may be sparse
    tiers: BTreeMap<TierId, TierSlots>,
    max_velocity: f32,
    merge_tx: Sender<MergeCandidate>,
}

impl ObjectPool {
    /// Instances created here forward contacts on `merge_tx`
    pub fn new(max_velocity: f32, merge_tx: Sender<MergeCandidate>) -> Self {
        Self {
            pieces: Vec::new(),
            retired: BTreeSet::new(),
            tiers: BTreeMap::new(),
            max_velocity,
            merge_tx,
        }
    }

    fn slots_mut(&mut self, tier: TierId) -> &mut TierSlots {
        self.tiers.entry(tier).or_default()
    }

    fn check_template(tier: &TierDefinition) -> Result<(), ConfigError> {
        if tier.has_template() {
            Ok(())
        } else {
            let err = ConfigError::MissingTemplate { tier: tier.id };
            log::error!("Pool: {}", err);
            Err(err)
        }
    }

    fn create_instance(&mut self, tier: &TierDefinition) -> u32 {
        let slot = self.pieces.len() as u32;
        let piece = Piece::new(slot, tier, self.max_velocity, self.merge_tx.clone());
        if piece.collider().shape.needs_fitting() {
            log::debug!("{} template collider will be fitted from its visual", tier);
        }
        self.pieces.push(piece);
        slot
    }

    /// Pre-allocate `count` pooled instances of `tier`
    ///
    /// Adds to whatever is already pooled; calling it again never resets.
    pub fn warmup(&mut self, tier: &TierDefinition, count: usize) -> Result<(), ConfigError> {
        Self::check_template(tier)?;
        for _ in 0..count {
            let slot = self.create_instance(tier);
            self.slots_mut(tier.id).free.push_back(slot);
        }
        log::debug!(
            "Warmed up {} x {} (free: {})",
            count,
            tier,
            self.free_count(tier.id)
        );
        Ok(())
    }

    /// Take a pooled instance (or allocate one) and initialize it as `tier`
    pub fn acquire(
        &mut self,
        tier: &TierDefinition,
        position: Vec2,
        kinematic: bool,
    ) -> Result<PieceHandle, ConfigError> {
        Self::check_template(tier)?;

        let slot = match self.slots_mut(tier.id).free.pop_front() {
            Some(slot) => slot,
            None => {
                log::debug!("Pool for {} is empty, allocating a new instance", tier);
                self.create_instance(tier)
            }
        };

        let piece = &mut self.pieces[slot as usize];
        piece.initialize(tier, position, kinematic);
        let handle = piece.handle();
        self.slots_mut(tier.id).active.insert(slot);

        log::trace!(
            "Acquired {} as {} (active: {}, free: {})",
            handle,
            tier,
            self.active_count(tier.id),
            self.free_count(tier.id)
        );
        Ok(handle)
    }

    /// Return a piece to the free queue of the tier it currently holds
    ///
    /// Stale handles are ignored. A piece that no longer holds a tier was
    /// already reset; its instance is discarded instead of being pooled
    /// twice. Returns true when the piece went back to a free queue.
    pub fn release(&mut self, handle: PieceHandle) -> bool {
        let slot = handle.slot();
        let Some(piece) = self.pieces.get_mut(slot as usize) else {
            log::warn!("Release of unknown piece {}", handle);
            return false;
        };
        if piece.handle() != handle || self.retired.contains(&slot) {
            log::debug!("Release of stale handle {} ignored", handle);
            return false;
        }

        let Some(tier) = piece.tier() else {
            log::error!("Release of {} without a tier; discarding instance", handle);
            piece.reset_for_reuse();
            piece.detach();
            let template = piece.template_tier();
            self.slots_mut(template).free.retain(|&s| s != slot);
            self.retired.insert(slot);
            return false;
        };

        piece.reset_for_reuse();
        piece.detach();

        let slots = self.slots_mut(tier);
        slots.active.remove(&slot);
        slots.free.push_back(slot);
        true
    }

    /// Release every active piece across all tiers
    pub fn release_all(&mut self) -> usize {
        let handles = self.active_handles();
        let released = handles.into_iter().filter(|&h| self.release(h)).count();
        log::debug!("Released {} active pieces", released);
        released
    }

    /// Resolve a handle; None once the instance has been reinitialized
    pub fn get(&self, handle: PieceHandle) -> Option<&Piece> {
        if self.retired.contains(&handle.slot()) {
            return None;
        }
        self.pieces
            .get(handle.slot() as usize)
            .filter(|p| p.handle() == handle)
    }

    pub fn get_mut(&mut self, handle: PieceHandle) -> Option<&mut Piece> {
        if self.retired.contains(&handle.slot()) {
            return None;
        }
        self.pieces
            .get_mut(handle.slot() as usize)
            .filter(|p| p.handle() == handle)
    }

    /// Whether the handle names a piece that is active in the world
    pub fn is_live(&self, handle: PieceHandle) -> bool {
        self.get(handle)
            .is_some_and(|p| p.is_active() && p.is_in_world())
    }

    /// Active handles, ordered by tier then slot
    pub fn active_handles(&self) -> Vec<PieceHandle> {
        self.tiers
            .values()
            .flat_map(|t| t.active.iter())
            .map(|&slot| self.pieces[slot as usize].handle())
            .collect()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &Piece> {
        self.pieces.iter().filter(|p| p.is_active())
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut Piece> {
        self.pieces.iter_mut().filter(|p| p.is_active())
    }

    /// Speed cap and depth correction for every active piece
    pub fn fixed_update(&mut self, depth_reference: f32) {
        for piece in self.iter_active_mut() {
            piece.fixed_update(depth_reference);
        }
    }

    pub fn active_count(&self, tier: TierId) -> usize {
        self.tiers.get(&tier).map_or(0, |t| t.active.len())
    }

    pub fn free_count(&self, tier: TierId) -> usize {
        self.tiers.get(&tier).map_or(0, |t| t.free.len())
    }

    pub fn total_active(&self) -> usize {
        self.tiers.values().map(|t| t.active.len()).sum()
    }

    /// Every instance allocated so far, including retired ones
    pub fn total_instances(&self) -> usize {
        self.pieces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MAX_VELOCITY;
    use crate::sim::catalog::TierCatalog;
    use crossbeam_channel::unbounded;

    fn pool() -> ObjectPool {
        let (tx, _rx) = unbounded();
        ObjectPool::new(MAX_VELOCITY, tx)
    }

    /// Every non-retired instance is in exactly one free queue or active set
    fn assert_partitioned(pool: &ObjectPool) {
        for slot in 0..pool.pieces.len() as u32 {
            if pool.retired.contains(&slot) {
                continue;
            }
            let homes: usize = pool
                .tiers
                .values()
                .map(|t| {
                    t.free.iter().filter(|&&s| s == slot).count()
                        + usize::from(t.active.contains(&slot))
                })
                .sum();
            assert_eq!(homes, 1, "slot {slot} has {homes} homes");
        }
    }

    #[test]
    fn test_warmup_is_additive() {
        let catalog = TierCatalog::classic();
        let tier = catalog.tier(0).unwrap();
        let mut pool = pool();
        pool.warmup(tier, 3).unwrap();
        pool.warmup(tier, 2).unwrap();
        assert_eq!(pool.free_count(0), 5);
        assert_eq!(pool.active_count(0), 0);
        assert_partitioned(&pool);
    }

    #[test]
    fn test_acquire_release_acquire_reuses_instance() {
        let catalog = TierCatalog::classic();
        let tier = catalog.tier(1).unwrap();
        let mut pool = pool();
        pool.warmup(tier, 1).unwrap();

        let first = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        assert!(pool.release(first));
        let second = pool.acquire(tier, Vec2::ONE, false).unwrap();

        assert_eq!(first.slot(), second.slot());
        assert_ne!(first, second);
        assert_eq!(pool.total_instances(), 1);
        assert!(pool.get(first).is_none());
        assert_eq!(pool.get(second).unwrap().position(), Vec2::ONE);
    }

    #[test]
    fn test_acquire_overflow_allocates() {
        let catalog = TierCatalog::classic();
        let tier = catalog.tier(0).unwrap();
        let mut pool = pool();
        let a = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        let b = pool.acquire(tier, Vec2::ZERO, true).unwrap();
        assert_ne!(a.slot(), b.slot());
        assert_eq!(pool.active_count(0), 2);
        assert_eq!(pool.free_count(0), 0);
        assert_partitioned(&pool);
    }

    #[test]
    fn test_acquire_without_template_fails() {
        let tier = TierDefinition::new(0, "ghost", 1).without_visual();
        let mut pool = pool();
        let err = pool.acquire(&tier, Vec2::ZERO, false).unwrap_err();
        assert!(matches!(err, ConfigError::MissingTemplate { tier: 0 }));
        assert!(pool.warmup(&tier, 2).is_err());
        assert_eq!(pool.total_instances(), 0);
    }

    #[test]
    fn test_release_moves_to_free_queue() {
        let catalog = TierCatalog::classic();
        let tier = catalog.tier(3).unwrap();
        let mut pool = pool();
        let h = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        assert!(pool.is_live(h));

        assert!(pool.release(h));
        assert_eq!(pool.active_count(3), 0);
        assert_eq!(pool.free_count(3), 1);
        let piece = pool.get(h).unwrap();
        assert!(!piece.is_active());
        assert!(!piece.is_in_world());
        assert!(!pool.is_live(h));
        assert_partitioned(&pool);
    }

    #[test]
    fn test_double_release_discards_instance() {
        let catalog = TierCatalog::classic();
        let tier = catalog.tier(0).unwrap();
        let mut pool = pool();
        let h = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        assert!(pool.release(h));
        assert!(!pool.release(h));

        assert_eq!(pool.free_count(0), 0);
        assert!(pool.get(h).is_none());
        assert_partitioned(&pool);

        // The retired slot is never handed out again
        let next = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        assert_ne!(next.slot(), h.slot());
    }

    #[test]
    fn test_stale_release_is_ignored() {
        let catalog = TierCatalog::classic();
        let tier = catalog.tier(0).unwrap();
        let mut pool = pool();
        let old = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        pool.release(old);
        let new = pool.acquire(tier, Vec2::ZERO, false).unwrap();

        assert!(!pool.release(old));
        assert!(pool.is_live(new));
        assert_eq!(pool.active_count(0), 1);
    }

    #[test]
    fn test_release_all() {
        let catalog = TierCatalog::classic();
        let mut pool = pool();
        for id in 0..4 {
            let tier = catalog.tier(id).unwrap();
            pool.acquire(tier, Vec2::ZERO, false).unwrap();
            pool.acquire(tier, Vec2::ZERO, false).unwrap();
        }
        assert_eq!(pool.total_active(), 8);
        assert_eq!(pool.release_all(), 8);
        assert_eq!(pool.total_active(), 0);
        assert_eq!(pool.free_count(2), 2);
        assert_partitioned(&pool);
    }

    #[test]
    fn test_counts_for_unknown_tier_are_zero() {
        let pool = pool();
        assert_eq!(pool.active_count(99), 0);
        assert_eq!(pool.free_count(99), 0);
    }

    #[test]
    fn test_sparse_tier_ids_stay_small() {
        let json = r#"{
            "tiers": [{ "id": 20000000, "name": "stray", "score_value": 1,
                        "visual": { "sprite_size": [1.0, 1.0] } }]
        }"#;
        let catalog = TierCatalog::from_json(json).unwrap();
        assert!(!catalog.validate().is_empty());
        let tier = catalog.tier(20_000_000).unwrap();

        let mut pool = pool();
        pool.warmup(tier, 1).unwrap();
        let h = pool.acquire(tier, Vec2::ZERO, false).unwrap();
        assert_eq!(pool.tiers.len(), 1);
        assert_eq!(pool.active_count(20_000_000), 1);
        assert_eq!(pool.active_handles(), vec![h]);
        assert_partitioned(&pool);
    }

    #[test]
    fn test_active_handles_are_ordered() {
        let catalog = TierCatalog::classic();
        let mut pool = pool();
        let b = pool.acquire(catalog.tier(1).unwrap(), Vec2::ZERO, false).unwrap();
        let a = pool.acquire(catalog.tier(0).unwrap(), Vec2::ZERO, false).unwrap();
        assert_eq!(pool.active_handles(), vec![a, b]);
    }
}
