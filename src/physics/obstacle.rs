//! Kinematic state of one synchronized body.
//!
//! Setters are the application's write path: on a shared obstacle every setter
//! records a [`FieldChange`], which the reconciliation engine turns into an
//! outbound delta once per tick. The physics step goes through
//! [`Obstacle::integrate`] instead and is never recorded.

use std::mem;
use std::ops::{Add, Mul, Sub};

/// Two-component vector in simulation units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Rigid body simulation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    Static,
    Kinematic,
    #[default]
    Dynamic,
}

impl BodyType {
    pub fn code(self) -> u32 {
        match self {
            BodyType::Static => 0,
            BodyType::Kinematic => 1,
            BodyType::Dynamic => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(BodyType::Static),
            1 => Some(BodyType::Kinematic),
            2 => Some(BodyType::Dynamic),
            _ => None,
        }
    }
}

/// Rarely-changing boolean body properties, synchronized as one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolConsts {
    pub enabled: bool,
    pub awake: bool,
    pub allow_sleep: bool,
    pub fixed_rotation: bool,
    pub bullet: bool,
    pub sensor: bool,
}

impl Default for BoolConsts {
    fn default() -> Self {
        Self {
            enabled: true,
            awake: true,
            allow_sleep: true,
            fixed_rotation: false,
            bullet: false,
            sensor: false,
        }
    }
}

impl BoolConsts {
    pub fn to_array(self) -> [bool; 6] {
        [
            self.enabled,
            self.awake,
            self.allow_sleep,
            self.fixed_rotation,
            self.bullet,
            self.sensor,
        ]
    }

    pub fn from_array(values: [bool; 6]) -> Self {
        Self {
            enabled: values[0],
            awake: values[1],
            allow_sleep: values[2],
            fixed_rotation: values[3],
            bullet: values[4],
            sensor: values[5],
        }
    }
}

/// Rarely-changing scalar body properties, synchronized as one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatConsts {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub mass: f32,
    pub inertia: f32,
}

impl Default for FloatConsts {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            mass: 1.0,
            inertia: 1.0,
        }
    }
}

impl FloatConsts {
    pub fn to_array(self) -> [f32; 8] {
        [
            self.density,
            self.friction,
            self.restitution,
            self.linear_damping,
            self.angular_damping,
            self.gravity_scale,
            self.mass,
            self.inertia,
        ]
    }

    pub fn from_array(values: [f32; 8]) -> Self {
        Self {
            density: values[0],
            friction: values[1],
            restitution: values[2],
            linear_damping: values[3],
            angular_damping: values[4],
            gravity_scale: values[5],
            mass: values[6],
            inertia: values[7],
        }
    }
}

/// A local write to a networked field of a shared obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldChange {
    Position(Vec2),
    Velocity(Vec2),
    Angle(f32),
    AngularVelocity(f32),
    BodyType(BodyType),
    BoolConsts(BoolConsts),
    FloatConsts(FloatConsts),
}

/// One simulated body as seen by the synchronization layer
#[derive(Debug, Clone, Default)]
pub struct Obstacle {
    position: Vec2,
    velocity: Vec2,
    angle: f32,
    angular_velocity: f32,
    body_type: BodyType,
    bools: BoolConsts,
    floats: FloatConsts,
    shared: bool,
    changes: Vec<FieldChange>,
}

impl Obstacle {
    /// A dynamic, unshared body at rest at `position`
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_body_type(mut self, body_type: BodyType) -> Self {
        self.body_type = body_type;
        self
    }

    pub fn with_float_consts(mut self, floats: FloatConsts) -> Self {
        self.floats = floats;
        self
    }

    pub fn with_bool_consts(mut self, bools: BoolConsts) -> Self {
        self.bools = bools;
        self
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn x(&self) -> f32 {
        self.position.x
    }

    pub fn y(&self) -> f32 {
        self.position.y
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn vx(&self) -> f32 {
        self.velocity.x
    }

    pub fn vy(&self) -> f32 {
        self.velocity.y
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn bool_consts(&self) -> BoolConsts {
        self.bools
    }

    pub fn float_consts(&self) -> FloatConsts {
        self.floats
    }

    /// Whether the body is subject to network reconciliation
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Turning sharing on does not record the current state; set it after
    /// initial configuration so peers building the same object stay quiet.
    pub fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.record(FieldChange::Position(position));
    }

    pub fn set_x(&mut self, x: f32) {
        self.set_position(Vec2::new(x, self.position.y));
    }

    pub fn set_y(&mut self, y: f32) {
        self.set_position(Vec2::new(self.position.x, y));
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
        self.record(FieldChange::Velocity(velocity));
    }

    pub fn set_vx(&mut self, vx: f32) {
        self.set_linear_velocity(Vec2::new(vx, self.velocity.y));
    }

    pub fn set_vy(&mut self, vy: f32) {
        self.set_linear_velocity(Vec2::new(self.velocity.x, vy));
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
        self.record(FieldChange::Angle(angle));
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f32) {
        self.angular_velocity = angular_velocity;
        self.record(FieldChange::AngularVelocity(angular_velocity));
    }

    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        self.record(FieldChange::BodyType(body_type));
    }

    pub fn set_bool_consts(&mut self, bools: BoolConsts) {
        self.bools = bools;
        self.record(FieldChange::BoolConsts(bools));
    }

    pub fn set_float_consts(&mut self, floats: FloatConsts) {
        self.floats = floats;
        self.record(FieldChange::FloatConsts(floats));
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_bool_consts(BoolConsts {
            enabled,
            ..self.bools
        });
    }

    pub fn set_sensor(&mut self, sensor: bool) {
        self.set_bool_consts(BoolConsts { sensor, ..self.bools });
    }

    pub fn set_density(&mut self, density: f32) {
        self.set_float_consts(FloatConsts {
            density,
            ..self.floats
        });
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.set_float_consts(FloatConsts {
            friction,
            ..self.floats
        });
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.set_float_consts(FloatConsts {
            restitution,
            ..self.floats
        });
    }

    /// Drains the writes recorded since the last call, at most one per field kind
    pub fn take_changes(&mut self) -> Vec<FieldChange> {
        mem::take(&mut self.changes)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    fn record(&mut self, change: FieldChange) {
        if !self.shared {
            return;
        }
        let kind = mem::discriminant(&change);
        if let Some(slot) = self
            .changes
            .iter_mut()
            .find(|c| mem::discriminant(*c) == kind)
        {
            *slot = change;
        } else {
            self.changes.push(change);
        }
    }

    /// Advances the body by one explicit Euler step. Not recorded as a change.
    pub fn integrate(&mut self, dt: f32, gravity: Vec2) {
        if self.body_type == BodyType::Static || !self.bools.enabled {
            return;
        }

        if self.body_type == BodyType::Dynamic {
            self.velocity = self.velocity + gravity * (self.floats.gravity_scale * dt);
            self.velocity = self.velocity * (1.0 / (1.0 + dt * self.floats.linear_damping));
            self.angular_velocity *= 1.0 / (1.0 + dt * self.floats.angular_damping);
        }

        self.position = self.position + self.velocity * dt;
        if !self.bools.fixed_rotation {
            self.angle += self.angular_velocity * dt;
        }
    }
}
