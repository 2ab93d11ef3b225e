//! Boundary to the rigid-body simulator
//!
//! The core does no integration or collision detection of its own. A backend
//! steps the world, reading each piece's [`Body`](super::piece::Body) for
//! commands (velocity, mode, simulated flag, collider enabled) and writing
//! positions and velocities back, then reports what touched what.

use glam::Vec2;

use super::piece::PieceHandle;
use super::pool::ObjectPool;

/// Anything the backend can report a contact for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyId {
    Piece(PieceHandle),
    /// Walls, floor and other level geometry
    Static(u32),
    /// The danger region watched for dwell time
    FailZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Enter,
    Stay,
}

/// One notification from a physics step
///
/// The same contact may be reported several times in a step, from either
/// side and in both phases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsEvent {
    Contact {
        body: BodyId,
        other: BodyId,
        point: Vec2,
        phase: ContactPhase,
    },
    TriggerEnter { body: BodyId, trigger: BodyId },
    TriggerExit { body: BodyId, trigger: BodyId },
}

/// A rigid-body simulator driving the pooled pieces
pub trait PhysicsBackend {
    /// Advance by `dt`, returning this step's contact and trigger reports
    fn step(&mut self, pool: &mut ObjectPool, dt: f32) -> Vec<PhysicsEvent>;
}
