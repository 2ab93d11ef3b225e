//! Fruit Merge - simulation core for a physics-driven merge puzzle
//!
//! Core modules:
//! - `sim`: Deterministic simulation (pool, merges, fail zone, spawn queue)
//! - `score`: Score collaborator with a persisted high score
//! - `persistence`: Key-value storage for the high score
//! - `settings`: Data-driven gameplay tuning
//!
//! Rendering, input capture and the rigid-body solver live outside this
//! crate. The core consumes [`sim::PhysicsEvent`]s and writes body commands
//! back onto each [`sim::Piece`].

pub mod error;
pub mod persistence;
pub mod score;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, StoreError};
pub use score::ScoreBoard;
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    use glam::Vec2;

    /// Fixed simulation timestep (50 Hz, matches the rigid-body solver)
    pub const SIM_DT: f32 = 1.0 / 50.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Speed cap for free-falling pieces (units/s)
    pub const MAX_VELOCITY: f32 = 15.0;
    /// Accumulated simulation time between merge queue drains (seconds)
    pub const MERGE_DELAY: f32 = 0.05;
    /// Offset applied to the midpoint of a merged pair
    pub const MERGE_SPAWN_OFFSET: Vec2 = Vec2::new(0.0, 0.3);
    /// Fraction of the averaged source velocity handed to a merged piece
    pub const MERGE_VELOCITY_DAMPING: f32 = 0.5;

    /// Dwell time inside the fail zone before the run ends (seconds)
    pub const FAIL_GRACE_TIME: f32 = 1.0;

    /// Instances pre-allocated per tier at startup
    pub const WARMUP_PER_TIER: usize = 5;

    /// Drop line and horizontal bounds for the spawner
    pub const SPAWN_Y: f32 = 8.0;
    pub const PREVIEW_OFFSET_Y: f32 = 0.5;
    pub const MIN_DROP_X: f32 = -6.0;
    pub const MAX_DROP_X: f32 = 6.0;
    /// Random horizontal nudge applied on drop so stacked drops don't balance
    pub const DROP_JITTER: f32 = 0.02;
    /// Delay before the next preview piece appears (seconds)
    pub const RESPAWN_DELAY: f32 = 0.3;

    /// Below this, a predefined collider dimension counts as "not set"
    pub const COLLIDER_SIZE_EPSILON: f32 = 0.01;
    /// Sprite radius the collider ratios are authored against
    pub const REFERENCE_RADIUS: f32 = 0.3;
    /// Visual scale used for ratios >= 1.0 (largest footprint allowed)
    pub const MAX_FOOTPRINT_SCALE: f32 = 0.11 / REFERENCE_RADIUS;
    /// Polygon colliders are decimated down to this many points
    pub const MAX_POLYGON_POINTS: usize = 16;

    /// Persisted key for the high score
    pub const HIGH_SCORE_KEY: &str = "HighScore";
}
