use crate::protocol::event::{Envelope, NetEvent};
use crate::protocol::handshake::Phase;
use std::collections::VecDeque;

/// Where an inbound event is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The session state machine, in every phase
    Session,
    /// The reconciliation engine; only while the game runs
    Physics,
    /// The application's inbound FIFO
    Application,
}

/// Routing policy for one decoded event.
/// Physics traffic that arrives before the game starts goes to the application
/// rather than being applied to a world that may not exist yet.
#[inline]
pub fn route<A>(event: &NetEvent<A>, phase: Phase) -> Route {
    match event {
        NetEvent::Session(_) => Route::Session,
        NetEvent::Snapshot(_) | NetEvent::ObjectDelta(_) if phase == Phase::InGame => Route::Physics,
        NetEvent::Snapshot(_) | NetEvent::ObjectDelta(_) | NetEvent::App(_) => Route::Application,
    }
}

/// Bounded FIFO of events waiting for the application.
/// When full, the oldest event makes room for the newest.
#[derive(Debug)]
pub struct InboundQueue<A> {
    events: VecDeque<Envelope<A>>,
    capacity: usize,
}

impl<A> InboundQueue<A> {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event; returns the evicted oldest event if the queue was full
    pub fn push(&mut self, envelope: Envelope<A>) -> Option<Envelope<A>> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(envelope);
        evicted
    }

    pub fn pop(&mut self) -> Option<Envelope<A>> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
