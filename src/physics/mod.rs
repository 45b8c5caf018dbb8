//! # Physics Reconciliation
//!
//! Object model and convergence engine for bodies shared between peers.
//!
//! ## Components
//! - **Ids**: owner-partitioned 64-bit object identifiers
//! - **Obstacle**: kinematic state with change recording on shared bodies
//! - **Guard**: scoped suppression of change recording for network writes
//! - **Interpolator**: step-count formula and per-tick blending
//! - **Factory**: typed construction from creation parameters
//! - **World**: storage trait plus a reference implementation
//! - **Controller**: the reconciliation engine itself

pub mod controller;
pub mod factory;
pub mod guard;
pub mod ids;
pub mod interpolator;
pub mod obstacle;
pub mod world;

pub use controller::{InterpolationStats, NetPhysicsController, PhysicsEvent};
pub use factory::{encode_params, BodyFactory, BodyParams, ObstacleFactory, ParamFactory};
pub use guard::SharedGuard;
pub use ids::ObjectId;
pub use obstacle::{BodyType, BoolConsts, FloatConsts, Obstacle, Vec2};
pub use world::{BasicWorld, ObstacleWorld};
