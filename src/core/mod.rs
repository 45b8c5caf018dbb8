//! # Core Wire Components
//!
//! Low-level byte codec and frame layout.
//!
//! This module is the foundation of the protocol: it knows nothing about event
//! semantics, only how primitives and frames are laid out on the wire.
//!
//! ## Components
//! - **Codec**: lenient big-endian reader/writer for fixed-width primitives
//! - **Frame**: tag byte plus sender tick in front of every event payload
//!
//! ## Wire Format
//! ```text
//! [Tag(1)] [SenderTick(8)] [Payload(N)]
//! ```
//!
//! ## Robustness
//! - Frames shorter than the header are rejected before any decoding
//! - Payload reads never panic on truncated input

pub mod codec;
pub mod frame;
