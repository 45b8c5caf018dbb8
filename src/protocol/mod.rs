//! # Protocol Layer
//!
//! Event model, tag registry, session handshake and inbound routing.
//!
//! ## Components
//! - **Event**: built-in session and physics events plus application events
//! - **Registry**: positional tag byte <-> event kind table, frame wrap/unwrap
//! - **Handshake**: phase state machine with short-id assignment and ready barrier
//! - **Dispatcher**: routing of decoded events by phase

pub mod dispatcher;
pub mod event;
pub mod handshake;
pub mod registry;

#[cfg(test)]
mod tests;

pub use event::{AppEvent, Envelope, EventMeta, NetEvent, NoAppEvent, SessionEvent};
pub use handshake::Phase;
pub use registry::{EventKind, EventRegistry};
