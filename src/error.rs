//! # Error Types
//!
//! Error handling for the synchronization layer.
//!
//! Errors only surface from explicit calls: enqueueing an event, registering a
//! factory, creating a shared object, loading configuration. Nothing here is
//! thrown out of the per-tick `update()`; protocol violations seen on the wire
//! are logged and discarded, and connection failures show up as
//! [`Phase::NetError`](crate::protocol::handshake::Phase::NetError).
//!
//! ## Error Categories
//! - **Wire Errors**: malformed frames, unknown tags, oversized frames
//! - **Registry Errors**: duplicate or excess event kinds
//! - **Object Errors**: unknown factories and objects, id collisions
//! - **Session Errors**: calls made in the wrong phase or before a short id exists
//! - **Configuration Errors**: unreadable or invalid configuration
//!
//! ## Example Usage
//! ```rust
//! use netphys::core::frame::unwrap_header;
//! use netphys::error::SyncError;
//! use tracing::warn;
//!
//! match unwrap_header(&[0x01, 0x02]) {
//!     Ok(_) => unreachable!(),
//!     Err(SyncError::MalformedFrame(reason)) => warn!(reason, "dropping frame"),
//!     Err(e) => warn!(error = %e, "dropping frame"),
//! }
//! ```

use crate::physics::ids::ObjectId;
use crate::protocol::handshake::Phase;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Frame validation errors
    pub const ERR_FRAME_TOO_SHORT: &str = "Frame shorter than the minimum frame length";
    pub const ERR_UNKNOWN_SESSION_KIND: &str = "Unknown session event kind";
    pub const ERR_UNKNOWN_DELTA_KIND: &str = "Unknown object delta kind";
    pub const ERR_UNDECODABLE_APP_EVENT: &str = "Application event payload could not be decoded";

    /// Transport errors
    pub const ERR_NO_CONNECTION: &str = "No open connection";
    pub const ERR_ROOM_NOT_FOUND: &str = "Room does not exist";
    pub const ERR_HUB_POISONED: &str = "Local hub lock poisoned";
}

/// SyncError is the primary error type for all synchronization operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(&'static str),

    #[error("Unknown event tag: {0}")]
    UnknownEventTag(u8),

    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    #[error("Event kind already registered: {0}")]
    DuplicateEventKind(String),

    #[error("Event registry is full (256 kinds)")]
    RegistryFull,

    #[error("Frame too large for the outbound byte ceiling: {0} bytes")]
    OversizedFrame(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Unknown obstacle factory: {0}")]
    UnknownFactory(u32),

    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("Object already exists: {0}")]
    DuplicateObject(ObjectId),

    #[error("No short id has been assigned yet")]
    NoShortId,

    #[error("Operation not valid in phase {0:?}")]
    InvalidPhase(Phase),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;
