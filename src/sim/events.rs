//! Outbound notifications
//!
//! Components publish on a `crossbeam_channel` sender handed to them at
//! construction. The [`EventBus`] owns the receiving end and fans events out
//! to whoever subscribed.

use crossbeam_channel::{Receiver, Sender, unbounded};
use glam::Vec2;

use super::catalog::TierId;
use super::state::GamePhase;

/// Everything the core tells the outside world
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Two pieces merged into one of `tier` at `position`
    MergeCompleted { tier: TierId, position: Vec2 },
    /// A piece stayed in the fail zone past the grace time
    GameOver,
    ScoreChanged(u64),
    HighScoreChanged(u64),
    /// Upcoming tiers shown in the preview
    QueueChanged {
        current: Option<TierId>,
        next: Option<TierId>,
    },
    PhaseChanged(GamePhase),
}

/// Sending half given to publishers
pub type EventSender = Sender<GameEvent>;

/// Publish on `events`; once the bus is dropped the event is logged and lost
pub(crate) fn emit(events: &EventSender, event: GameEvent) {
    if let Err(err) = events.send(event) {
        log::debug!("Event bus is gone; dropping {:?}", err.into_inner());
    }
}

/// Returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GameEvent)>;

/// Fan-out of published events to registered listeners
pub struct EventBus {
    tx: EventSender,
    rx: Receiver<GameEvent>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    /// A sender for a new publisher
    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&GameEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver every pending event, in publish order, to every listener
    ///
    /// Events published while nobody listens are still drained (and dropped).
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        for event in self.rx.try_iter() {
            for (_, listener) in self.listeners.iter_mut() {
                listener(&event);
            }
            delivered += 1;
        }
        delivered
    }

    /// Drain pending events without notifying anyone
    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.rx.try_iter().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.rx.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
