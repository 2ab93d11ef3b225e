//! A single pooled game piece
//!
//! A piece wraps the body/collider state the external solver mirrors, the
//! tier it currently represents and its merge lock. Lifecycle:
//!
//! ```text
//! Pooled --initialize--> Active --lock_for_merge--> Locked --reset--> Pooled
//!                          \-------------------reset-----------------/
//! ```
//!
//! Pieces never lock themselves on contact; they only filter and forward
//! candidates to the merge coordinator, which owns locking.

use crossbeam_channel::Sender;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::catalog::{TierDefinition, TierId, VisualParams};
use super::merge::MergeCandidate;
use crate::consts::*;

/// Generational handle to a pooled instance
///
/// The slot identifies the underlying instance for its whole lifetime; the
/// generation changes on every `initialize`, so handles taken before a piece
/// was recycled stop resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PieceHandle {
    slot: u32,
    generation: u32,
}

impl PieceHandle {
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Index of the underlying instance
    #[inline]
    pub fn slot(&self) -> u32 {
        self.slot
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Unordered pair key, used to dedupe A/B and B/A reports
    pub fn pair_key(a: Self, b: Self) -> (Self, Self) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

impl std::fmt::Display for PieceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.slot, self.generation)
    }
}

/// Rigid body mode commanded to the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyMode {
    #[default]
    Dynamic,
    Kinematic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapsuleDirection {
    #[default]
    Vertical,
    Horizontal,
}

/// Collider geometry, chosen once per template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColliderShape {
    Circle {
        radius: f32,
    },
    Box {
        size: Vec2,
    },
    Capsule {
        size: Vec2,
        #[serde(default)]
        direction: CapsuleDirection,
    },
    Polygon {
        #[serde(default)]
        points: Vec<Vec2>,
    },
    Edge {
        #[serde(default)]
        points: Vec<Vec2>,
        #[serde(default)]
        edge_radius: f32,
    },
}

impl Default for ColliderShape {
    fn default() -> Self {
        ColliderShape::Circle { radius: 0.0 }
    }
}

impl ColliderShape {
    /// True when the template left the size unset
    pub fn needs_fitting(&self) -> bool {
        match self {
            ColliderShape::Circle { radius } => *radius <= COLLIDER_SIZE_EPSILON,
            ColliderShape::Box { size } | ColliderShape::Capsule { size, .. } => {
                size.x <= COLLIDER_SIZE_EPSILON || size.y <= COLLIDER_SIZE_EPSILON
            }
            ColliderShape::Polygon { points } | ColliderShape::Edge { points, .. } => {
                points.is_empty()
            }
        }
    }

    /// Half extents of the shape's bounding box
    pub fn half_extents(&self) -> Vec2 {
        match self {
            ColliderShape::Circle { radius } => Vec2::splat(*radius),
            ColliderShape::Box { size } | ColliderShape::Capsule { size, .. } => *size / 2.0,
            ColliderShape::Polygon { points } => bounds_half_extents(points),
            ColliderShape::Edge {
                points,
                edge_radius,
            } => bounds_half_extents(points) + Vec2::splat(*edge_radius),
        }
    }
}

fn bounds_half_extents(points: &[Vec2]) -> Vec2 {
    points.iter().fold(Vec2::ZERO, |acc, p| acc.max(p.abs()))
}

/// Visual scale for a tier's collider ratio
///
/// Ratios of 1.0 and above share one capped footprint.
pub fn visual_scale(collider_radius: f32) -> f32 {
    if collider_radius >= 1.0 {
        MAX_FOOTPRINT_SCALE
    } else {
        collider_radius / REFERENCE_RADIUS
    }
}

/// Corners of a rectangle of `size` centered on the origin
fn rect_points(size: Vec2) -> Vec<Vec2> {
    let h = size / 2.0;
    vec![
        Vec2::new(-h.x, -h.y),
        Vec2::new(h.x, -h.y),
        Vec2::new(h.x, h.y),
        Vec2::new(-h.x, h.y),
    ]
}

/// Keep every n-th point so at most `max_points` remain
pub fn decimate(points: &[Vec2], max_points: usize) -> Vec<Vec2> {
    if points.len() <= max_points || max_points == 0 {
        return points.to_vec();
    }
    let step = (points.len() / max_points).max(1);
    let len = max_points.min(points.len() / step);
    (0..len).map(|i| points[i * step]).collect()
}

/// Collider attached to a piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub offset: Vec2,
    pub enabled: bool,
}

impl Collider {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            offset: Vec2::ZERO,
            enabled: true,
        }
    }

    /// Derive unset dimensions from the visual bounds
    ///
    /// Only zero-sized dimensions are touched, so refitting an already fitted
    /// collider is a no-op.
    pub fn fit(&mut self, tier: &TierDefinition, visual: &VisualParams, scale: f32) {
        let scaled = visual.sprite_size * scale;
        let min_size = Vec2::splat(COLLIDER_SIZE_EPSILON);

        match &mut self.shape {
            ColliderShape::Circle { radius } if *radius <= COLLIDER_SIZE_EPSILON => {
                let half_min = scaled.x.min(scaled.y) / 2.0;
                let ratio = tier.collider_radius;
                let fitted = if ratio > COLLIDER_SIZE_EPSILON && ratio < 1.0 {
                    half_min * ratio
                } else {
                    half_min
                };
                *radius = fitted.max(COLLIDER_SIZE_EPSILON);
            }
            ColliderShape::Box { size }
                if size.x <= COLLIDER_SIZE_EPSILON || size.y <= COLLIDER_SIZE_EPSILON =>
            {
                *size = scaled.max(min_size);
            }
            ColliderShape::Capsule { size, direction }
                if size.x <= COLLIDER_SIZE_EPSILON || size.y <= COLLIDER_SIZE_EPSILON =>
            {
                *size = scaled.max(min_size);
                *direction = if size.y >= size.x {
                    CapsuleDirection::Vertical
                } else {
                    CapsuleDirection::Horizontal
                };
            }
            ColliderShape::Polygon { points } => {
                if points.is_empty() {
                    *points = rect_points(scaled.max(min_size));
                }
                if points.len() > MAX_POLYGON_POINTS {
                    *points = decimate(points, MAX_POLYGON_POINTS);
                }
            }
            ColliderShape::Edge {
                points,
                edge_radius,
            } => {
                if *edge_radius <= COLLIDER_SIZE_EPSILON {
                    *edge_radius = COLLIDER_SIZE_EPSILON;
                }
                if points.is_empty() {
                    let mut ring = rect_points(scaled.max(min_size));
                    ring.push(ring[0]);
                    *points = ring;
                }
            }
            _ => {}
        }

        if self.offset == Vec2::ZERO {
            self.offset = -visual.sprite_center;
        }
    }
}

/// Body state the solver reads back each step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// World position; z is out-of-plane drift from a 3-axis integrator
    pub position: Vec3,
    pub rotation: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    pub mode: BodyMode,
    /// When false the solver skips the body entirely
    pub simulated: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mode: BodyMode::Dynamic,
            simulated: true,
        }
    }
}

impl Body {
    fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
    }
}

/// A pooled game piece
#[derive(Debug)]
pub struct Piece {
    handle: PieceHandle,
    /// Tier whose template built this instance
    template: TierId,
    tier: Option<TierId>,
    body: Body,
    collider: Collider,
    scale: f32,
    locked: bool,
    active: bool,
    /// False while parked in the pool, outside the live simulation space
    in_world: bool,
    max_velocity: f32,
    merge_tx: Sender<MergeCandidate>,
}

impl Piece {
    /// A fresh, pooled instance built from `template`
    pub(crate) fn new(
        slot: u32,
        template: &TierDefinition,
        max_velocity: f32,
        merge_tx: Sender<MergeCandidate>,
    ) -> Self {
        Self {
            handle: PieceHandle::new(slot, 0),
            template: template.id,
            tier: None,
            body: Body::default(),
            collider: Collider::new(template.collider.clone()),
            scale: 1.0,
            locked: false,
            active: false,
            in_world: false,
            max_velocity,
            merge_tx,
        }
    }

    /// Pooled -> Active
    pub fn initialize(&mut self, tier: &TierDefinition, position: Vec2, kinematic: bool) {
        self.handle.generation = self.handle.generation.wrapping_add(1);
        self.tier = Some(tier.id);

        self.body = Body {
            position: position.extend(0.0),
            mode: if kinematic {
                BodyMode::Kinematic
            } else {
                BodyMode::Dynamic
            },
            ..Body::default()
        };

        self.scale = visual_scale(tier.collider_radius);
        if let Some(visual) = &tier.visual {
            self.collider.fit(tier, visual, self.scale);
        }
        self.collider.enabled = true;

        self.locked = false;
        self.active = true;
        self.in_world = true;
    }

    /// Freeze the piece for a pending merge
    ///
    /// Returns false (and changes nothing) if the piece was already locked.
    pub fn lock_for_merge(&mut self) -> bool {
        if self.locked {
            log::warn!("Piece {} is already locked for merge", self.handle);
            return false;
        }

        self.locked = true;
        self.body.stop();
        self.body.simulated = false;
        self.collider.enabled = false;
        true
    }

    /// Clear tier, flags and physics state for pooling
    pub fn reset_for_reuse(&mut self) {
        self.locked = false;
        self.active = false;
        self.tier = None;

        self.body.stop();
        self.body.mode = BodyMode::Dynamic;
        self.body.simulated = true;
        self.collider.enabled = true;
    }

    /// Move the instance out of the live simulation space
    pub(crate) fn detach(&mut self) {
        self.in_world = false;
    }

    /// Per fixed step: speed cap and depth correction for free dynamic bodies
    pub fn fixed_update(&mut self, depth_reference: f32) {
        if !self.active || self.locked || self.body.mode != BodyMode::Dynamic {
            return;
        }
        self.clamp_velocity();
        if self.body.position.z != depth_reference {
            self.body.position.z = depth_reference;
        }
    }

    /// Rescale velocity to `max_velocity` if it exceeds it; true if clamped
    pub fn clamp_velocity(&mut self) -> bool {
        let max = self.max_velocity;
        if self.body.velocity.length_squared() > max * max {
            self.body.velocity = self.body.velocity.normalize_or_zero() * max;
            return true;
        }
        false
    }

    /// Filter a contact report and forward same-tier pairs for merging
    ///
    /// Enter and stay reports are handled identically; repeated reports of
    /// one contact are expected. Nothing is locked here.
    pub fn handle_contact(&self, other: &Piece, contact_point: Vec2) -> bool {
        if self.locked || other.locked {
            return false;
        }
        let (Some(mine), Some(theirs)) = (self.tier, other.tier) else {
            return false;
        };
        if mine != theirs {
            return false;
        }

        log::debug!(
            "Tier {} contact {} <-> {} at {}",
            mine,
            self.handle,
            other.handle,
            contact_point
        );

        let candidate = MergeCandidate {
            a: self.handle,
            b: other.handle,
            contact_point,
        };
        if self.merge_tx.send(candidate).is_err() {
            log::warn!("Merge coordinator is gone; dropping contact from {}", self.handle);
            return false;
        }
        true
    }

    #[inline]
    pub fn handle(&self) -> PieceHandle {
        self.handle
    }

    #[inline]
    pub fn tier(&self) -> Option<TierId> {
        self.tier
    }

    #[inline]
    pub fn template_tier(&self) -> TierId {
        self.template
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn is_in_world(&self) -> bool {
        self.in_world
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Solver write-back (positions, velocities after integration)
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.body.position.truncate()
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.body.position = position.extend(self.body.position.z);
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.body.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.body.velocity = velocity;
    }

    pub fn set_body_mode(&mut self, mode: BodyMode) {
        self.body.mode = mode;
    }

    pub fn set_simulated(&mut self, simulated: bool) {
        self.body.simulated = simulated;
    }
}
