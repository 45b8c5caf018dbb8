//! # Service Layer
//!
//! The per-peer session controller that ties transport, protocol and
//! reconciliation together behind one tick-driven API.

pub mod controller;

pub use controller::NetEventController;
