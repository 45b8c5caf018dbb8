//! # netphys
//!
//! Tick-driven event protocol and physics-state reconciliation for real-time
//! multiplayer simulations.
//!
//! One peer hosts a room, the others join; the host hands out short ids, waits
//! until everyone is ready and starts the game. From then on every peer sends
//! per-field deltas for the shared bodies it changes, the host (by default)
//! sends periodic snapshots, and every peer blends remote state in over a few
//! ticks instead of snapping.
//!
//! ## Layout
//! - [`core`]: byte codec and frame layout
//! - [`protocol`]: events, tag registry, handshake, routing
//! - [`physics`]: object model and reconciliation engine
//! - [`transport`]: connection traits and an in-process implementation
//! - [`service`]: the per-peer session controller
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Example
//! ```rust
//! use netphys::config::NetConfig;
//! use netphys::physics::BasicWorld;
//! use netphys::service::NetEventController;
//! use netphys::transport::LocalHub;
//!
//! let hub = LocalHub::new();
//! let mut host: NetEventController<_, _> =
//!     NetEventController::new(NetConfig::default(), hub.clone(), BasicWorld::new()).unwrap();
//! assert!(host.connect_as_host());
//! host.update();
//! assert!(host.room_id().is_some());
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod physics;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::NetConfig;
pub use error::{Result, SyncError};
pub use physics::{NetPhysicsController, ObjectId, Obstacle, ObstacleWorld};
pub use protocol::{AppEvent, Envelope, EventMeta, NetEvent, Phase, SessionEvent};
pub use service::NetEventController;
pub use transport::{Connection, ConnectionState, Connector, LocalHub};
