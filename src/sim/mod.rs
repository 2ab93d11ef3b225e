//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep for merges and velocity caps
//! - Seeded RNG only
//! - Stable iteration order (by tier, then slot)
//! - No rendering, input or physics-solver dependencies

pub mod catalog;
pub mod events;
pub mod fail_zone;
pub mod merge;
pub mod physics;
pub mod piece;
pub mod pool;
pub mod spawn_queue;
pub mod spawner;
pub mod state;
pub mod tick;

pub use catalog::{TierCatalog, TierDefinition, TierId, VisualParams};
pub use events::{EventBus, EventSender, GameEvent, SubscriptionId};
pub use fail_zone::FailZoneMonitor;
pub use merge::{MergeCandidate, MergeConfig, MergeCoordinator, MergeOutcome, ScoreSink};
pub use physics::{BodyId, ContactPhase, PhysicsBackend, PhysicsEvent};
pub use piece::{Body, BodyMode, CapsuleDirection, Collider, ColliderShape, Piece, PieceHandle};
pub use pool::ObjectPool;
pub use spawn_queue::SpawnQueuePreview;
pub use spawner::{Spawner, SpawnerConfig};
pub use state::{GamePhase, GameState};
pub use tick::{TickInput, frame, tick};
