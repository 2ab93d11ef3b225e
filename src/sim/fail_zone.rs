//! Fail zone dwell tracking
//!
//! Pieces inside the danger region accumulate dwell time; the first one to
//! reach the grace time ends the run. Leaving the region discards the timer,
//! so a piece bouncing across the boundary never builds up time.

use std::collections::BTreeMap;

use super::events::{EventSender, GameEvent, emit};
use super::piece::{Piece, PieceHandle};
use super::pool::ObjectPool;

#[derive(Debug)]
pub struct FailZoneMonitor {
    grace_time: f32,
    /// Seconds spent inside since the last enter
    dwell: BTreeMap<PieceHandle, f32>,
    events: EventSender,
}

impl FailZoneMonitor {
    pub fn new(grace_time: f32, events: EventSender) -> Self {
        Self {
            grace_time,
            dwell: BTreeMap::new(),
            events,
        }
    }

    pub fn grace_time(&self) -> f32 {
        self.grace_time
    }

    /// Start tracking `piece`; re-entering while tracked keeps the old timer
    pub fn on_enter(&mut self, piece: &Piece) -> bool {
        if piece.is_locked() || !piece.is_active() {
            return false;
        }
        if self.dwell.contains_key(&piece.handle()) {
            return false;
        }
        self.dwell.insert(piece.handle(), 0.0);
        log::debug!("Piece {} entered the fail zone", piece.handle());
        true
    }

    pub fn on_exit(&mut self, handle: PieceHandle) -> bool {
        let tracked = self.dwell.remove(&handle).is_some();
        if tracked {
            log::debug!("Piece {} left the fail zone", handle);
        }
        tracked
    }

    /// Advance every tracked timer by `dt`
    ///
    /// Pieces that were recycled or deactivated are dropped silently; locked
    /// pieces hold their time. Returns true when game over fired, after which
    /// all tracking is cleared.
    pub fn update(&mut self, dt: f32, pool: &ObjectPool) -> bool {
        self.dwell.retain(|&handle, _| pool.is_live(handle));

        let mut expired = None;
        for (&handle, elapsed) in self.dwell.iter_mut() {
            if pool.get(handle).is_some_and(|p| p.is_locked()) {
                continue;
            }
            *elapsed += dt;
            if *elapsed >= self.grace_time {
                expired = Some((handle, *elapsed));
                break;
            }
        }

        let Some((handle, elapsed)) = expired else {
            return false;
        };

        log::info!(
            "Game over: piece {} stayed in the fail zone for {:.2}s",
            handle,
            elapsed
        );
        emit(&self.events, GameEvent::GameOver);
        self.dwell.clear();
        true
    }

    pub fn reset(&mut self) {
        self.dwell.clear();
    }

    pub fn is_tracking(&self, handle: PieceHandle) -> bool {
        self.dwell.contains_key(&handle)
    }

    pub fn dwell_time(&self, handle: PieceHandle) -> Option<f32> {
        self.dwell.get(&handle).copied()
    }

    pub fn tracked_count(&self) -> usize {
        self.dwell.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::catalog::TierCatalog;
    use crate::sim::events::EventBus;
    use crossbeam_channel::unbounded;
    use glam::Vec2;
    use proptest::prelude::*;

    struct Rig {
        bus: EventBus,
        monitor: FailZoneMonitor,
        pool: ObjectPool,
        catalog: TierCatalog,
    }

    impl Rig {
        fn new() -> Self {
            let bus = EventBus::new();
            let monitor = FailZoneMonitor::new(FAIL_GRACE_TIME, bus.sender());
            let (tx, _rx) = unbounded();
            Self {
                bus,
                monitor,
                pool: ObjectPool::new(MAX_VELOCITY, tx),
                catalog: TierCatalog::classic(),
            }
        }

        fn spawn(&mut self) -> PieceHandle {
            let tier = self.catalog.tier(0).unwrap();
            self.pool.acquire(tier, Vec2::ZERO, false).unwrap()
        }

        fn enter(&mut self, h: PieceHandle) -> bool {
            let piece = self.pool.get(h).unwrap();
            self.monitor.on_enter(piece)
        }
    }

    #[test]
    fn test_staying_past_grace_ends_game_once() {
        let mut rig = Rig::new();
        let a = rig.spawn();
        let b = rig.spawn();
        rig.enter(a);
        rig.enter(b);

        assert!(!rig.monitor.update(0.5, &rig.pool));
        assert!(rig.monitor.update(0.5, &rig.pool));
        assert_eq!(rig.monitor.tracked_count(), 0);
        assert_eq!(rig.bus.drain(), vec![GameEvent::GameOver]);

        // Tracking was cleared; nothing fires until pieces re-enter
        assert!(!rig.monitor.update(5.0, &rig.pool));
        assert!(rig.bus.drain().is_empty());
    }

    #[test]
    fn test_exit_discards_timer() {
        let mut rig = Rig::new();
        let a = rig.spawn();
        rig.enter(a);
        rig.monitor.update(0.9, &rig.pool);
        assert!(rig.monitor.on_exit(a));
        assert!(!rig.monitor.on_exit(a));

        rig.enter(a);
        assert_eq!(rig.monitor.dwell_time(a), Some(0.0));
        assert!(!rig.monitor.update(0.9, &rig.pool));
    }

    #[test]
    fn test_reenter_while_tracked_keeps_timer() {
        let mut rig = Rig::new();
        let a = rig.spawn();
        assert!(rig.enter(a));
        rig.monitor.update(0.5, &rig.pool);
        assert!(!rig.enter(a));
        assert_eq!(rig.monitor.dwell_time(a), Some(0.5));
    }

    #[test]
    fn test_locked_pieces_are_not_tracked() {
        let mut rig = Rig::new();
        let a = rig.spawn();
        rig.pool.get_mut(a).unwrap().lock_for_merge();
        assert!(!rig.enter(a));
    }

    #[test]
    fn test_released_piece_is_dropped() {
        let mut rig = Rig::new();
        let a = rig.spawn();
        rig.enter(a);
        rig.pool.release(a);
        assert!(!rig.monitor.update(2.0, &rig.pool));
        assert!(!rig.monitor.is_tracking(a));
        assert!(rig.bus.drain().is_empty());
    }

    #[test]
    fn test_locked_while_tracked_holds_time() {
        let mut rig = Rig::new();
        let a = rig.spawn();
        rig.enter(a);
        rig.monitor.update(0.5, &rig.pool);
        rig.pool.get_mut(a).unwrap().lock_for_merge();
        assert!(!rig.monitor.update(2.0, &rig.pool));
        assert_eq!(rig.monitor.dwell_time(a), Some(0.5));
    }

    proptest! {
        #[test]
        fn leaving_before_grace_never_ends_game(
            visits in prop::collection::vec(prop::collection::vec(0.0f32..0.2, 0..4), 1..20),
        ) {
            let mut rig = Rig::new();
            let a = rig.spawn();
            for frames in visits {
                // Each visit stays well under the grace time (at most 0.8s)
                rig.enter(a);
                for dt in frames {
                    prop_assert!(!rig.monitor.update(dt, &rig.pool));
                }
                rig.monitor.on_exit(a);
                prop_assert!(!rig.monitor.update(0.5, &rig.pool));
            }
            prop_assert!(rig.bus.drain().is_empty());
        }
    }
}
