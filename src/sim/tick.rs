//! Fixed timestep simulation tick
//!
//! Two clocks drive the game. `tick` runs once per fixed physics step:
//! it applies input, routes the step's contact and trigger reports, caps
//! velocities and drains merges. `frame` runs once per presented frame with
//! the variable frame time and advances the dwell and respawn timers.

use super::merge::MergeOutcome;
use super::physics::{BodyId, PhysicsEvent};
use super::state::{GamePhase, GameState};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Horizontal drop position (pointer/touch, in world units)
    pub drop_x: Option<f32>,
    /// Release the preview piece
    pub drop: bool,
    /// Pause toggle
    pub pause: bool,
    /// Restart the run
    pub restart: bool,
}

/// Advance the game state by one fixed timestep
pub fn tick(
    state: &mut GameState,
    input: &TickInput,
    physics: &[PhysicsEvent],
    dt: f32,
) -> Vec<MergeOutcome> {
    if input.restart {
        state.restart_game();
        return Vec::new();
    }

    if input.pause {
        state.toggle_pause();
    }

    // Don't tick unless playing
    if state.phase != GamePhase::Playing {
        return Vec::new();
    }
    state.time_ticks += 1;

    if let Some(x) = input.drop_x {
        state.spawner.set_drop_x(x, &mut state.pool);
    }
    if input.drop {
        state.spawner.drop_piece(&mut state.pool, &state.catalog, &mut state.queue);
    }

    dispatch_physics(state, physics);

    state.pool.fixed_update(state.settings.depth_reference);
    state.merges.fixed_update(dt, &mut state.pool, &state.catalog, &mut state.score)
}

/// Route contact and trigger reports to pieces and the fail zone
fn dispatch_physics(state: &mut GameState, physics: &[PhysicsEvent]) {
    for event in physics {
        match *event {
            PhysicsEvent::Contact {
                body: BodyId::Piece(a),
                other: BodyId::Piece(b),
                point,
                ..
            } => {
                // Pieces filter and forward to the merge coordinator themselves
                if let (Some(pa), Some(pb)) = (state.pool.get(a), state.pool.get(b)) {
                    pa.handle_contact(pb, point);
                }
            }
            PhysicsEvent::TriggerEnter {
                body: BodyId::Piece(h),
                trigger: BodyId::FailZone,
            } => {
                if let Some(piece) = state.pool.get(h) {
                    state.fail_zone.on_enter(piece);
                }
            }
            PhysicsEvent::TriggerExit {
                body: BodyId::Piece(h),
                trigger: BodyId::FailZone,
            } => {
                state.fail_zone.on_exit(h);
            }
            _ => {}
        }
    }
}

/// Advance presentation-clock timers by the frame time
///
/// Returns true if the run ended this frame.
pub fn frame(state: &mut GameState, dt: f32) -> bool {
    if state.phase != GamePhase::Playing {
        return false;
    }

    state.spawner.update(dt, &mut state.pool, &state.catalog, &state.queue);

    if state.fail_zone.update(dt, &state.pool) {
        state.game_over();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::persistence::MemoryStore;
    use crate::settings::Settings;
    use crate::sim::catalog::TierCatalog;
    use crate::sim::events::{EventBus, GameEvent};
    use crate::sim::physics::ContactPhase;
    use crate::sim::piece::PieceHandle;
    use glam::Vec2;

    fn new_state(seed: u64) -> (EventBus, GameState) {
        let bus = EventBus::new();
        let state = GameState::new(
            seed,
            Settings::default(),
            TierCatalog::classic(),
            Box::new(MemoryStore::new()),
            bus.sender(),
        );
        (bus, state)
    }

    fn place(state: &mut GameState, tier: u32, x: f32) -> PieceHandle {
        let def = state.catalog.tier(tier).unwrap();
        state.pool.acquire(def, Vec2::new(x, 0.0), false).unwrap()
    }

    fn contact(a: PieceHandle, b: PieceHandle, phase: ContactPhase) -> PhysicsEvent {
        PhysicsEvent::Contact {
            body: BodyId::Piece(a),
            other: BodyId::Piece(b),
            point: Vec2::ZERO,
            phase,
        }
    }

    fn run(state: &mut GameState, ticks: usize) -> Vec<MergeOutcome> {
        let input = TickInput::default();
        (0..ticks)
            .flat_map(|_| tick(state, &input, &[], SIM_DT))
            .collect()
    }

    #[test]
    fn test_tick_ignored_outside_playing() {
        let (_bus, mut state) = new_state(12345);
        let input = TickInput {
            drop: true,
            ..Default::default()
        };
        tick(&mut state, &input, &[], SIM_DT);
        assert_eq!(state.phase, GamePhase::MainMenu);
        assert_eq!(state.time_ticks, 0);
        assert!(!frame(&mut state, 1.0));
    }

    #[test]
    fn test_tick_pause() {
        let (_bus, mut state) = new_state(12345);
        state.start_game();

        let input = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &input, &[], SIM_DT);
        assert_eq!(state.phase, GamePhase::Paused);
        assert_eq!(state.time_ticks, 0);

        // Unpause
        tick(&mut state, &input, &[], SIM_DT);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.time_ticks, 1);
    }

    #[test]
    fn test_duplicate_contacts_merge_once() {
        let (mut bus, mut state) = new_state(7);
        state.start_game();
        let a = place(&mut state, 0, -0.2);
        let b = place(&mut state, 0, 0.2);
        let tier0 = state.pool.active_count(0);
        let tier1 = state.pool.active_count(1);
        bus.drain();

        let reports = [
            contact(a, b, ContactPhase::Enter),
            contact(b, a, ContactPhase::Enter),
            contact(a, b, ContactPhase::Stay),
            contact(b, a, ContactPhase::Stay),
        ];
        let mut outcomes = tick(&mut state, &TickInput::default(), &reports, SIM_DT);
        outcomes.extend(run(&mut state, 4));

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(
            outcomes[0],
            MergeOutcome::Merged { from: 0, into: 1, .. }
        ));
        assert_eq!(state.pool.active_count(0), tier0 - 2);
        assert_eq!(state.pool.active_count(1), tier1 + 1);
        assert_eq!(state.score.current(), 3);

        let merged: Vec<_> = bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::MergeCompleted { .. }))
            .collect();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_no_merge_before_delay() {
        let (_bus, mut state) = new_state(7);
        state.start_game();
        let a = place(&mut state, 2, -0.2);
        let b = place(&mut state, 2, 0.2);

        let reports = [contact(a, b, ContactPhase::Enter)];
        assert!(tick(&mut state, &TickInput::default(), &reports, SIM_DT).is_empty());
        assert!(state.pool.is_live(a) && state.pool.is_live(b));
        assert!(!run(&mut state, 3).is_empty());
        assert!(!state.pool.is_live(a) && !state.pool.is_live(b));
    }

    #[test]
    fn test_fail_zone_ends_game() {
        let (mut bus, mut state) = new_state(3);
        state.start_game();
        let a = place(&mut state, 0, 0.0);
        bus.drain();

        let enter = [PhysicsEvent::TriggerEnter {
            body: BodyId::Piece(a),
            trigger: BodyId::FailZone,
        }];
        tick(&mut state, &TickInput::default(), &enter, SIM_DT);

        assert!(!frame(&mut state, 0.5));
        assert!(frame(&mut state, 0.5));
        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(!state.spawner.allow_input());

        let events = bus.drain();
        assert!(events.contains(&GameEvent::GameOver));
        assert!(events.contains(&GameEvent::PhaseChanged(GamePhase::GameOver)));

        // Frozen afterwards
        let ticks = state.time_ticks;
        tick(&mut state, &TickInput::default(), &[], SIM_DT);
        assert_eq!(state.time_ticks, ticks);
    }

    #[test]
    fn test_bouncing_at_boundary_survives() {
        let (_bus, mut state) = new_state(3);
        state.start_game();
        let a = place(&mut state, 0, 0.0);
        let enter = [PhysicsEvent::TriggerEnter {
            body: BodyId::Piece(a),
            trigger: BodyId::FailZone,
        }];
        let exit = [PhysicsEvent::TriggerExit {
            body: BodyId::Piece(a),
            trigger: BodyId::FailZone,
        }];

        for _ in 0..10 {
            tick(&mut state, &TickInput::default(), &enter, SIM_DT);
            assert!(!frame(&mut state, 0.25));
            tick(&mut state, &TickInput::default(), &exit, SIM_DT);
            assert!(!frame(&mut state, 0.25));
        }
        assert!(state.is_playing());
    }

    #[test]
    fn test_drop_and_respawn() {
        let (_bus, mut state) = new_state(9);
        state.start_game();
        let preview = state.spawner.preview().unwrap();

        let input = TickInput {
            drop_x: Some(1.5),
            drop: true,
            ..Default::default()
        };
        tick(&mut state, &input, &[], SIM_DT);
        assert!(state.spawner.preview().is_none());
        let dropped = state.pool.get(preview).unwrap();
        assert!(dropped.body().simulated);
        assert!((dropped.position().x - 1.5).abs() <= DROP_JITTER + 1e-5);

        frame(&mut state, RESPAWN_DELAY + 0.01);
        assert!(state.spawner.preview().is_some());
        assert_eq!(state.pool.total_active(), 2);
    }

    #[test]
    fn test_restart_input_drops_pending_merges() {
        let (_bus, mut state) = new_state(4);
        state.start_game();
        let a = place(&mut state, 0, -0.2);
        let b = place(&mut state, 0, 0.2);
        tick(
            &mut state,
            &TickInput::default(),
            &[contact(a, b, ContactPhase::Enter)],
            SIM_DT,
        );
        assert_eq!(state.merges.pending_len(), 1);

        let restart = TickInput {
            restart: true,
            ..Default::default()
        };
        tick(&mut state, &restart, &[], SIM_DT);
        assert!(run(&mut state, 10).is_empty());
        assert_eq!(state.score.current(), 0);
    }

    #[test]
    fn test_determinism() {
        // Two states with same seed should produce identical results
        let (_bus1, mut state1) = new_state(99999);
        let (_bus2, mut state2) = new_state(99999);
        state1.start_game();
        state2.start_game();

        let inputs = [
            TickInput {
                drop_x: Some(0.5),
                ..Default::default()
            },
            TickInput {
                drop: true,
                ..Default::default()
            },
            TickInput {
                drop_x: Some(-2.0),
                ..Default::default()
            },
            TickInput::default(),
        ];

        for _ in 0..5 {
            for input in &inputs {
                tick(&mut state1, input, &[], SIM_DT);
                tick(&mut state2, input, &[], SIM_DT);
                frame(&mut state1, SIM_DT * 5.0);
                frame(&mut state2, SIM_DT * 5.0);
            }
        }

        assert_eq!(state1.time_ticks, state2.time_ticks);
        assert_eq!(state1.queue.current(), state2.queue.current());
        assert_eq!(state1.queue.next(), state2.queue.next());
        let positions = |s: &GameState| -> Vec<Vec2> {
            s.pool.iter_active().map(|p| p.position()).collect()
        };
        assert_eq!(positions(&state1), positions(&state2));
    }
}
