//! Player-controlled dropper
//!
//! Shows the current tier as a frozen preview piece above the container,
//! slides it horizontally on input, and releases it into the simulation on
//! drop. The next preview appears after a short delay.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::catalog::TierCatalog;
use super::piece::{BodyMode, PieceHandle};
use super::pool::ObjectPool;
use super::spawn_queue::SpawnQueuePreview;
use crate::consts::*;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnerConfig {
    pub spawn_y: f32,
    pub preview_offset_y: f32,
    pub min_x: f32,
    pub max_x: f32,
    /// Half-width of the horizontal jitter applied on drop
    pub drop_jitter: f32,
    pub respawn_delay: f32,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            spawn_y: SPAWN_Y,
            preview_offset_y: PREVIEW_OFFSET_Y,
            min_x: MIN_DROP_X,
            max_x: MAX_DROP_X,
            drop_jitter: DROP_JITTER,
            respawn_delay: RESPAWN_DELAY,
        }
    }
}

#[derive(Debug)]
pub struct Spawner {
    config: SpawnerConfig,
    preview: Option<PieceHandle>,
    drop_x: f32,
    allow_input: bool,
    /// Seconds until the next preview appears
    respawn_in: Option<f32>,
    rng: Pcg32,
}

impl Spawner {
    pub fn new(config: SpawnerConfig, seed: u64) -> Self {
        Self {
            config,
            preview: None,
            drop_x: 0.0,
            allow_input: false,
            respawn_in: None,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    pub fn preview(&self) -> Option<PieceHandle> {
        self.preview
    }

    pub fn drop_x(&self) -> f32 {
        self.drop_x
    }

    pub fn allow_input(&self) -> bool {
        self.allow_input
    }

    pub fn set_allow_input(&mut self, allow: bool) {
        self.allow_input = allow;
    }

    pub fn is_respawn_pending(&self) -> bool {
        self.respawn_in.is_some()
    }

    fn preview_position(&self) -> Vec2 {
        Vec2::new(self.drop_x, self.config.spawn_y + self.config.preview_offset_y)
    }

    /// Move the drop position, clamped to the container
    pub fn set_drop_x(&mut self, x: f32, pool: &mut ObjectPool) {
        if !self.allow_input {
            return;
        }
        self.drop_x = x.clamp(self.config.min_x, self.config.max_x);

        let position = self.preview_position();
        let preview = self.preview.filter(|&h| pool.is_live(h));
        if let Some(piece) = preview.and_then(|h| pool.get_mut(h)) {
            piece.set_position(position);
        }
    }

    /// Show the queue's current tier as a frozen preview piece
    pub fn spawn_preview(
        &mut self,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        queue: &SpawnQueuePreview,
    ) -> Option<PieceHandle> {
        if let Some(existing) = self.preview.filter(|&h| pool.is_live(h)) {
            return Some(existing);
        }

        let Some(current) = queue.current() else {
            log::error!("Spawner: spawn queue has no current tier");
            return None;
        };
        let Some(tier) = catalog.tier(current) else {
            log::error!("Spawner: {}", ConfigError::UnknownTier(current));
            return None;
        };

        let handle = match pool.acquire(tier, self.preview_position(), true) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!("Spawner: preview of {} failed: {}", tier, err);
                return None;
            }
        };
        if let Some(piece) = pool.get_mut(handle) {
            piece.set_body_mode(BodyMode::Kinematic);
            piece.set_simulated(false);
        }

        log::debug!("Preview {} is {}", handle, tier);
        self.preview = Some(handle);
        Some(handle)
    }

    /// Release the preview into the simulation and advance the queue
    pub fn drop_piece(
        &mut self,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        queue: &mut SpawnQueuePreview,
    ) -> Option<PieceHandle> {
        if !self.allow_input {
            return None;
        }
        let handle = self.preview.take()?;

        let jitter = if self.config.drop_jitter > 0.0 {
            self.rng
                .random_range(-self.config.drop_jitter..=self.config.drop_jitter)
        } else {
            0.0
        };

        // A pooled instance still resolves until reused
        let live = pool.is_live(handle);
        let Some(piece) = pool.get_mut(handle).filter(|_| live) else {
            log::warn!("Spawner: preview {} vanished before drop", handle);
            self.respawn_in = Some(self.config.respawn_delay);
            return None;
        };
        let position = piece.position() + Vec2::new(jitter, 0.0);
        piece.set_position(position);
        piece.set_body_mode(BodyMode::Dynamic);
        piece.set_simulated(true);
        piece.set_velocity(Vec2::ZERO);
        piece.body_mut().angular_velocity = 0.0;

        log::debug!("Dropped {} at {}", handle, position);

        queue.advance(catalog);
        self.respawn_in = Some(self.config.respawn_delay);
        Some(handle)
    }

    /// Count down the pending respawn; shows the next preview when it elapses
    pub fn update(
        &mut self,
        dt: f32,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        queue: &SpawnQueuePreview,
    ) -> Option<PieceHandle> {
        let remaining = self.respawn_in.as_mut()?;
        *remaining -= dt;
        if *remaining > 0.0 {
            return None;
        }
        self.respawn_in = None;
        self.spawn_preview(pool, catalog, queue)
    }

    /// Return the preview to the pool and cancel any pending respawn
    pub fn reset(&mut self, pool: &mut ObjectPool) {
        // The preview may already be back in the pool after a release_all
        if let Some(handle) = self.preview.take().filter(|&h| pool.is_live(h)) {
            pool.release(handle);
        }
        self.respawn_in = None;
        self.drop_x = 0.0;
    }

    /// Reset, then show the first preview
    pub fn start(
        &mut self,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        queue: &SpawnQueuePreview,
    ) -> Option<PieceHandle> {
        self.reset(pool);
        self.spawn_preview(pool, catalog, queue)
    }
}
