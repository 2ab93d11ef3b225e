//! Game state and flow
//!
//! `GameState` owns every simulation component and wires them together:
//! the pool forwards contacts to the merge coordinator, and every component
//! publishes on the same event sender. Flow commands (start, restart, pause)
//! live here; per-step work lives in `tick`.

use serde::{Deserialize, Serialize};

use super::catalog::TierCatalog;
use super::events::{EventSender, GameEvent, emit};
use super::fail_zone::FailZoneMonitor;
use super::merge::MergeCoordinator;
use super::pool::ObjectPool;
use super::spawn_queue::SpawnQueuePreview;
use super::spawner::Spawner;
use crate::persistence::KeyValueStore;
use crate::score::ScoreBoard;
use crate::settings::Settings;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Nothing running yet
    MainMenu,
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// A piece stayed in the fail zone too long
    GameOver,
}

/// Complete game state (deterministic for a given seed and input stream)
#[derive(Debug)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    /// Current phase
    pub phase: GamePhase,
    /// Simulation tick counter (Playing only)
    pub time_ticks: u64,
    pub settings: Settings,
    pub catalog: TierCatalog,
    pub pool: ObjectPool,
    pub merges: MergeCoordinator,
    pub fail_zone: FailZoneMonitor,
    pub queue: SpawnQueuePreview,
    pub spawner: Spawner,
    pub score: ScoreBoard,
    events: EventSender,
}

impl GameState {
    /// Build and warm up every component; the game starts in `MainMenu`
    pub fn new(
        seed: u64,
        settings: Settings,
        catalog: TierCatalog,
        store: Box<dyn KeyValueStore>,
        events: EventSender,
    ) -> Self {
        for problem in catalog.validate() {
            log::warn!("Tier catalog: {}", problem);
        }

        let merges = MergeCoordinator::new(settings.merge_config(), events.clone());
        let mut pool = ObjectPool::new(settings.max_velocity, merges.sender());
        for tier in catalog.tiers() {
            if let Err(err) = pool.warmup(tier, settings.warmup_per_tier) {
                log::error!("Skipping warmup of {}: {}", tier, err);
            }
        }
        log::info!(
            "Pool warmed up: {} instances across {} tiers",
            pool.total_instances(),
            catalog.len()
        );

        let fail_zone = FailZoneMonitor::new(settings.grace_time, events.clone());
        let queue = SpawnQueuePreview::new(seed, events.clone());
        // Separate stream so drop jitter never shifts the queue sequence
        let spawner = Spawner::new(settings.spawner_config(), seed.wrapping_add(1));
        let score = ScoreBoard::new(store, settings.high_score_key.clone(), events.clone());

        Self {
            seed,
            phase: GamePhase::MainMenu,
            time_ticks: 0,
            settings,
            catalog,
            pool,
            merges,
            fail_zone,
            queue,
            spawner,
            score,
            events,
        }
    }

    /// Move to `phase`, updating input gating and notifying listeners
    pub fn change_phase(&mut self, phase: GamePhase) {
        if self.phase == phase {
            return;
        }
        log::info!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.spawner.set_allow_input(phase == GamePhase::Playing);
        emit(&self.events, GameEvent::PhaseChanged(phase));
    }

    pub fn start_game(&mut self) {
        self.change_phase(GamePhase::Playing);
        self.queue.initialize(&self.catalog);
        self.spawner.set_allow_input(true);
        self.spawner.start(&mut self.pool, &self.catalog, &self.queue);
        self.score.reset_score();
        self.fail_zone.reset();
    }

    /// Clear the board and every pending intent, then start over
    pub fn restart_game(&mut self) {
        let released = self.pool.release_all();
        self.merges.clear_queue();
        self.spawner.reset(&mut self.pool);
        self.queue.reset();
        self.score.reset_score();
        self.fail_zone.reset();
        self.time_ticks = 0;
        log::info!("Restarting ({} pieces cleared)", released);

        self.start_game();
    }

    /// Playing <-> Paused; ignored in other phases
    pub fn toggle_pause(&mut self) {
        match self.phase {
            GamePhase::Playing => self.change_phase(GamePhase::Paused),
            GamePhase::Paused => self.change_phase(GamePhase::Playing),
            _ => {}
        }
    }

    /// End the run; only a running game can end
    pub fn game_over(&mut self) {
        if self.phase != GamePhase::Playing {
            return;
        }
        self.change_phase(GamePhase::GameOver);
        log::info!("Game over with {} points", self.score.current());
    }

    pub fn is_playing(&self) -> bool {
        self.phase == GamePhase::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::sim::events::EventBus;

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

    #[test]
    fn test_new_warms_every_tier() {
        let (_bus, state) = new_state(1);
        assert_eq!(state.phase, GamePhase::MainMenu);
        for tier in state.catalog.tiers() {
            assert_eq!(state.pool.free_count(tier.id), 5);
        }
        assert!(!state.spawner.allow_input());
    }

    #[test]
    fn test_start_game_shows_preview() {
        let (mut bus, mut state) = new_state(1);
        bus.drain();
        state.start_game();

        assert!(state.is_playing());
        assert!(state.spawner.allow_input());
        let preview = state.spawner.preview().unwrap();
        assert_eq!(state.pool.get(preview).unwrap().tier(), state.queue.current());

        let events = bus.drain();
        assert_eq!(events[0], GameEvent::PhaseChanged(GamePhase::Playing));
        assert!(events.iter().any(|e| matches!(e, GameEvent::QueueChanged { .. })));
    }

    #[test]
    fn test_toggle_pause_gates_input() {
        let (_bus, mut state) = new_state(1);
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::MainMenu);

        state.start_game();
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Paused);
        assert!(!state.spawner.allow_input());
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.spawner.allow_input());
    }

    #[test]
    fn test_game_over_only_from_playing() {
        let (_bus, mut state) = new_state(1);
        state.game_over();
        assert_eq!(state.phase, GamePhase::MainMenu);

        state.start_game();
        state.game_over();
        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(!state.spawner.allow_input());
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::GameOver);
    }

    #[test]
    fn test_restart_clears_board() {
        let (_bus, mut state) = new_state(1);
        state.start_game();
        let tier = state.catalog.tier(0).unwrap().clone();
        for i in 0..4 {
            state
                .pool
                .acquire(&tier, glam::Vec2::new(i as f32, 0.0), false)
                .unwrap();
        }
        state.score.add_score(10);
        state.game_over();

        state.restart_game();
        assert!(state.is_playing());
        // Only the fresh preview remains
        assert_eq!(state.pool.total_active(), 1);
        assert_eq!(state.score.current(), 0);
        assert_eq!(state.score.high(), 10);
        assert_eq!(state.merges.pending_len(), 0);
        assert_eq!(state.fail_zone.tracked_count(), 0);
    }
}
