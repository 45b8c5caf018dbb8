//! # Transport Layer
//!
//! The session controller talks to the network only through [`Connection`]:
//! it polls the connection state, broadcasts or unicasts opaque frames, and
//! drains received frames once per tick. Everything else about the network
//! (NAT traversal, relays, rooms) belongs to the implementation.
//!
//! ## Implementations
//! - **Local**: in-process rooms for tests, benches and single-machine demos
//!
//! Delivery is not assumed reliable. Reconciliation tolerates duplicated and
//! reordered frames.

pub mod local;

use crate::error::Result;

pub use local::{LocalConnection, LocalHub};

/// Transport-level connection state, as reported by the implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Opening; not usable yet
    Negotiating,
    /// Joined the room, waiting for the session to be established
    Connected,
    /// Every expected peer is present and frames may flow
    SessionEstablished,
    Denied,
    Disconnected,
    Failed,
    Invalid,
    /// Peers disagree on protocol or game version
    Mismatched,
}

impl ConnectionState {
    /// Whether the connection can no longer make progress
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ConnectionState::Denied
                | ConnectionState::Disconnected
                | ConnectionState::Failed
                | ConnectionState::Invalid
                | ConnectionState::Mismatched
        )
    }
}

/// One peer's membership in a room
pub trait Connection {
    fn open(&mut self) -> Result<()>;

    fn close(&mut self);

    fn state(&self) -> ConnectionState;

    /// Sends a frame to every other peer in the room
    fn broadcast(&mut self, frame: &[u8]) -> Result<()>;

    /// Sends a frame to one peer
    fn send_to(&mut self, peer_id: &str, frame: &[u8]) -> Result<()>;

    /// Hands every frame received since the last call to `on_frame` as
    /// `(source peer id, frame)`, in arrival order
    fn receive(&mut self, on_frame: &mut dyn FnMut(&str, &[u8]));

    /// Ids of the other peers in the room
    fn peers(&self) -> Vec<String>;

    fn peer_count(&self) -> usize {
        self.peers().len()
    }

    fn room_id(&self) -> Option<String>;
}

/// Builds connections for the controller
pub trait Connector {
    type Connection: Connection;

    /// A connection that will create a new room
    fn host(&mut self) -> Self::Connection;

    /// A connection that will join `room_id`
    fn client(&mut self, room_id: &str) -> Self::Connection;
}
