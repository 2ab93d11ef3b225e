//! Current score and persisted high score
//!
//! The merge coordinator awards points through [`ScoreSink`]; every change is
//! published as an event. The high score lives in a [`KeyValueStore`] under a
//! single key and is written whenever it is beaten.

use crate::persistence::KeyValueStore;
use crate::sim::events::{EventSender, GameEvent, emit};
use crate::sim::merge::ScoreSink;

pub struct ScoreBoard {
    current: u64,
    high: u64,
    key: String,
    store: Box<dyn KeyValueStore>,
    events: EventSender,
}

impl ScoreBoard {
    /// Create a board and load the stored high score
    pub fn new(store: Box<dyn KeyValueStore>, key: impl Into<String>, events: EventSender) -> Self {
        let mut board = Self {
            current: 0,
            high: 0,
            key: key.into(),
            store,
            events,
        };
        board.load_high_score();
        board
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn high(&self) -> u64 {
        self.high
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Add `points`; ignores zero
    pub fn add_score(&mut self, points: u32) {
        if points == 0 {
            return;
        }
        self.current += u64::from(points);
        emit(&self.events, GameEvent::ScoreChanged(self.current));
        log::debug!("+{} points (total: {})", points, self.current);

        if self.current > self.high {
            self.high = self.current;
            emit(&self.events, GameEvent::HighScoreChanged(self.high));
            self.store.set(&self.key, self.high);
        }
    }

    pub fn reset_score(&mut self) {
        self.current = 0;
        emit(&self.events, GameEvent::ScoreChanged(0));
    }

    pub fn load_high_score(&mut self) {
        self.high = self.store.get(&self.key).unwrap_or(0);
        emit(&self.events, GameEvent::HighScoreChanged(self.high));
        log::info!("High score loaded: {}", self.high);
    }

    pub fn clear_high_score(&mut self) {
        self.high = 0;
        self.store.remove(&self.key);
        emit(&self.events, GameEvent::HighScoreChanged(0));
        log::info!("High score cleared");
    }
}

impl ScoreSink for ScoreBoard {
    fn add_score(&mut self, points: u32) {
        ScoreBoard::add_score(self, points);
    }
}

impl std::fmt::Debug for ScoreBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreBoard")
            .field("current", &self.current)
            .field("high", &self.high)
            .field("key", &self.key)
            .finish()
    }
}
