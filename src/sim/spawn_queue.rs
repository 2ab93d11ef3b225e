//! Upcoming-tier preview
//!
//! Holds the tier about to be dropped and the one after it. Draws come from
//! the catalog's spawnable range using a seeded RNG, so a run replays
//! identically from its seed.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::catalog::{TierCatalog, TierId};
use super::events::{EventSender, GameEvent, emit};

#[derive(Debug)]
pub struct SpawnQueuePreview {
    current: Option<TierId>,
    next: Option<TierId>,
    rng: Pcg32,
    events: EventSender,
}

impl SpawnQueuePreview {
    pub fn new(seed: u64, events: EventSender) -> Self {
        Self {
            current: None,
            next: None,
            rng: Pcg32::seed_from_u64(seed),
            events,
        }
    }

    pub fn current(&self) -> Option<TierId> {
        self.current
    }

    pub fn next(&self) -> Option<TierId> {
        self.next
    }

    fn draw(&mut self, catalog: &TierCatalog) -> Option<TierId> {
        catalog.random_spawnable_tier(&mut self.rng).map(|t| t.id)
    }

    fn publish(&self) {
        emit(
            &self.events,
            GameEvent::QueueChanged {
                current: self.current,
                next: self.next,
            },
        );
    }

    /// Fill both slots; false if the catalog has nothing to spawn
    pub fn initialize(&mut self, catalog: &TierCatalog) -> bool {
        self.current = self.draw(catalog);
        self.next = self.draw(catalog);
        self.publish();

        log::info!(
            "Spawn queue started (current: {:?}, next: {:?})",
            self.current,
            self.next
        );
        if self.current.is_none() || self.next.is_none() {
            log::error!("Spawn queue could not be filled from the catalog");
            return false;
        }
        true
    }

    /// Shift `next` into `current` and draw a fresh `next`
    pub fn advance(&mut self, catalog: &TierCatalog) -> Option<TierId> {
        if self.next.is_none() {
            log::warn!("Spawn queue had no next tier, drawing one");
            self.next = self.draw(catalog);
        }
        self.current = self.next;
        self.next = self.draw(catalog);
        self.publish();

        log::debug!(
            "Spawn queue advanced (current: {:?}, next: {:?})",
            self.current,
            self.next
        );
        self.current
    }

    /// Empty both slots
    pub fn reset(&mut self) {
        self.current = None;
        self.next = None;
        self.publish();
    }
}
