//! Merge coordinator
//!
//! Contact reports arrive any number of times per step, from both sides of a
//! pair. The coordinator dedupes them into a FIFO of candidates and drains
//! that queue on a fixed cadence of simulation time. Each candidate is
//! revalidated at drain time and both pieces are locked before anything is
//! released, so a piece can feed at most one merge.

use std::collections::{HashSet, VecDeque};

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::Vec2;

use super::catalog::{TierCatalog, TierId};
use super::events::{EventSender, GameEvent, emit};
use super::piece::{Piece, PieceHandle};
use super::pool::ObjectPool;
use crate::consts::*;
use crate::error::ConfigError;

/// A same-tier contact waiting for the next drain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeCandidate {
    pub a: PieceHandle,
    pub b: PieceHandle,
    pub contact_point: Vec2,
}

/// Receives points for each completed merge
pub trait ScoreSink {
    fn add_score(&mut self, points: u32);
}

/// What a drained candidate turned into
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Both sources released, one piece of `into` spawned
    Merged {
        sources: [PieceHandle; 2],
        from: TierId,
        into: TierId,
        piece: PieceHandle,
        position: Vec2,
    },
    /// Max tier: both sources released, nothing spawned
    MaxTier {
        sources: [PieceHandle; 2],
        tier: TierId,
    },
    /// Both sources released but the merged piece could not be created
    SpawnFailed {
        sources: [PieceHandle; 2],
        from: TierId,
        into: TierId,
    },
}

impl MergeOutcome {
    pub fn sources(&self) -> [PieceHandle; 2] {
        match self {
            MergeOutcome::Merged { sources, .. }
            | MergeOutcome::MaxTier { sources, .. }
            | MergeOutcome::SpawnFailed { sources, .. } => *sources,
        }
    }
}

/// Tuning for merge execution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// Simulation seconds accumulated between drains
    pub merge_delay: f32,
    /// Added to the midpoint of the two sources
    pub spawn_offset: Vec2,
    /// Fraction of the sources' mean velocity given to the merged piece
    pub velocity_damping: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_delay: MERGE_DELAY,
            spawn_offset: MERGE_SPAWN_OFFSET,
            velocity_damping: MERGE_VELOCITY_DAMPING,
        }
    }
}

/// A candidate that survived revalidation
struct ValidPair {
    tier: TierId,
    positions: [Vec2; 2],
    velocities: [Vec2; 2],
}

#[derive(Debug)]
pub struct MergeCoordinator {
    config: MergeConfig,
    pending: VecDeque<MergeCandidate>,
    /// Unordered pairs already pending in this drain window
    queued: HashSet<(PieceHandle, PieceHandle)>,
    inbox: Receiver<MergeCandidate>,
    outbox: Sender<MergeCandidate>,
    timer: f32,
    events: EventSender,
}

impl MergeCoordinator {
    pub fn new(config: MergeConfig, events: EventSender) -> Self {
        let (outbox, inbox) = unbounded();
        Self {
            config,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            inbox,
            outbox,
            timer: 0.0,
            events,
        }
    }

    /// Handle given to pieces for forwarding contacts
    pub fn sender(&self) -> Sender<MergeCandidate> {
        self.outbox.clone()
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn timer(&self) -> f32 {
        self.timer
    }

    /// Queue a same-tier pair for the next drain
    ///
    /// Rejects locked pieces, differing or missing tiers, self-pairs and
    /// pairs already pending in this window. Nothing is locked here.
    pub fn on_collision(&mut self, a: &Piece, b: &Piece, contact_point: Vec2) -> bool {
        if a.handle() == b.handle() || a.is_locked() || b.is_locked() {
            return false;
        }
        match (a.tier(), b.tier()) {
            (Some(ta), Some(tb)) if ta == tb => {}
            (Some(_), Some(_)) => return false,
            _ => {
                log::warn!("Contact between {} and {} without a tier", a.handle(), b.handle());
                return false;
            }
        }

        if !self.queued.insert(PieceHandle::pair_key(a.handle(), b.handle())) {
            return false;
        }

        self.pending.push_back(MergeCandidate {
            a: a.handle(),
            b: b.handle(),
            contact_point,
        });
        log::debug!(
            "Queued merge {} <-> {} (queue: {})",
            a.handle(),
            b.handle(),
            self.pending.len()
        );
        true
    }

    /// Move candidates forwarded by pieces into the queue
    pub fn collect(&mut self, pool: &ObjectPool) -> usize {
        let incoming: Vec<MergeCandidate> = self.inbox.try_iter().collect();
        let mut queued = 0;
        for candidate in incoming {
            match (pool.get(candidate.a), pool.get(candidate.b)) {
                (Some(a), Some(b)) => {
                    if self.on_collision(a, b, candidate.contact_point) {
                        queued += 1;
                    }
                }
                _ => log::debug!(
                    "Dropping contact {} <-> {}: piece already recycled",
                    candidate.a,
                    candidate.b
                ),
            }
        }
        queued
    }

    /// Advance the drain timer by one fixed step; drains when it elapses
    ///
    /// The timer only runs while something is queued.
    pub fn fixed_update(
        &mut self,
        dt: f32,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        score: &mut dyn ScoreSink,
    ) -> Vec<MergeOutcome> {
        self.collect(pool);

        if self.pending.is_empty() {
            return Vec::new();
        }

        self.timer += dt;
        if self.timer < self.config.merge_delay {
            return Vec::new();
        }

        let outcomes = self.drain(pool, catalog, score);
        self.timer = 0.0;
        outcomes
    }

    /// Resolve every pending candidate in FIFO order
    pub fn drain(
        &mut self,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        score: &mut dyn ScoreSink,
    ) -> Vec<MergeOutcome> {
        self.queued.clear();
        let mut outcomes = Vec::new();

        while let Some(candidate) = self.pending.pop_front() {
            let Some(valid) = Self::revalidate(pool, &candidate) else {
                log::debug!(
                    "Skipping stale merge {} <-> {}",
                    candidate.a,
                    candidate.b
                );
                continue;
            };

            // Lock both before any release so neither can join another pair
            for handle in [candidate.a, candidate.b] {
                if let Some(piece) = pool.get_mut(handle) {
                    piece.lock_for_merge();
                }
            }

            outcomes.push(self.execute(&candidate, valid, pool, catalog, score));
        }

        if !outcomes.is_empty() {
            log::debug!("Drained {} merges", outcomes.len());
        }
        outcomes
    }

    fn revalidate(pool: &ObjectPool, candidate: &MergeCandidate) -> Option<ValidPair> {
        if candidate.a == candidate.b {
            return None;
        }
        if !pool.is_live(candidate.a) || !pool.is_live(candidate.b) {
            return None;
        }
        let a = pool.get(candidate.a)?;
        let b = pool.get(candidate.b)?;
        if a.is_locked() || b.is_locked() {
            return None;
        }
        let tier = a.tier()?;
        if b.tier()? != tier {
            return None;
        }
        Some(ValidPair {
            tier,
            positions: [a.position(), b.position()],
            velocities: [a.velocity(), b.velocity()],
        })
    }

    fn execute(
        &self,
        candidate: &MergeCandidate,
        valid: ValidPair,
        pool: &mut ObjectPool,
        catalog: &TierCatalog,
        score: &mut dyn ScoreSink,
    ) -> MergeOutcome {
        let sources = [candidate.a, candidate.b];
        let current = catalog.tier(valid.tier);
        let next = current.and_then(|t| catalog.next_tier(t));

        let Some(next) = next else {
            match current {
                Some(tier) => log::info!("{} is the max tier, clearing pair", tier),
                None => log::error!("Merge: {}", ConfigError::UnknownTier(valid.tier)),
            }
            pool.release(candidate.a);
            pool.release(candidate.b);
            return MergeOutcome::MaxTier {
                sources,
                tier: valid.tier,
            };
        };

        let [pos_a, pos_b] = valid.positions;
        let [vel_a, vel_b] = valid.velocities;
        let spawn_position = (pos_a + pos_b) / 2.0 + self.config.spawn_offset;
        let average_velocity = (vel_a + vel_b) / 2.0;

        // Release first: the acquire may reuse one of these slots
        pool.release(candidate.a);
        pool.release(candidate.b);

        let handle = match pool.acquire(next, spawn_position, false) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!(
                    "Merge {} -> {} lost both sources: {}",
                    valid.tier,
                    next.id,
                    err
                );
                return MergeOutcome::SpawnFailed {
                    sources,
                    from: valid.tier,
                    into: next.id,
                };
            }
        };

        if let Some(piece) = pool.get_mut(handle) {
            piece.set_velocity(average_velocity * self.config.velocity_damping);
        }

        score.add_score(next.score_value);
        emit(
            &self.events,
            GameEvent::MergeCompleted {
                tier: next.id,
                position: spawn_position,
            },
        );

        log::info!(
            "Merged tier {} -> {} at {} (+{})",
            valid.tier,
            next,
            spawn_position,
            next.score_value
        );

        MergeOutcome::Merged {
            sources,
            from: valid.tier,
            into: next.id,
            piece: handle,
            position: spawn_position,
        }
    }

    /// Drop every pending candidate and reset the drain timer
    pub fn clear_queue(&mut self) {
        let forwarded = self.inbox.try_iter().count();
        let dropped = self.pending.len() + forwarded;
        self.pending.clear();
        self.queued.clear();
        self.timer = 0.0;
        log::debug!("Merge queue cleared ({} dropped)", dropped);
    }
}
