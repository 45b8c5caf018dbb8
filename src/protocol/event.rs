//! # Event Model
//!
//! Every message between peers is a [`NetEvent`]: a closed sum of the built-in
//! session and physics events plus the application's own event enum. Each
//! variant owns its payload layout; the frame header (tag and sender tick) is
//! added by the registry.
//!
//! Applications extend the set by implementing [`AppEvent`] on their own enum,
//! never by growing the built-in variants.

use crate::config::FRAME_HEADER_LEN;
use crate::core::codec::{Deserializer, Serializer};
use crate::error::{constants, Result, SyncError};
use crate::physics::ids::ObjectId;
use crate::physics::obstacle::{FieldChange, Obstacle};
use crate::protocol::registry::EventKind;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

/// Per-event metadata that travels beside the payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMeta {
    /// Sender's epoch-relative tick when the frame was built
    pub sender_tick: u64,
    /// Receiver's epoch-relative tick on arrival; never transmitted
    pub receive_tick: u64,
    /// Transport peer id of the sender; empty for locally originated events
    pub source_id: String,
}

impl EventMeta {
    /// Metadata for an event that never crossed the wire
    pub fn local(tick: u64) -> Self {
        Self {
            sender_tick: tick,
            receive_tick: tick,
            source_id: String::new(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.source_id.is_empty()
    }
}

/// Application-defined events carried next to the built-in ones.
///
/// Every peer must report the same `kinds()` in the same order; the registry
/// assigns tags from that order.
pub trait AppEvent: Sized + fmt::Debug {
    /// Stable names of every variant, in registration order
    fn kinds() -> &'static [&'static str];

    /// Name of this value's variant; must be one of `kinds()`
    fn kind(&self) -> &'static str;

    fn serialize(&self, out: &mut Serializer);

    /// Rebuilds the variant registered as `kind`, or `None` if the payload is unusable
    fn deserialize(kind: &str, input: &mut Deserializer) -> Option<Self>;
}

/// Placeholder for sessions with no application events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAppEvent {}

impl AppEvent for NoAppEvent {
    fn kinds() -> &'static [&'static str] {
        &[]
    }

    fn kind(&self) -> &'static str {
        match *self {}
    }

    fn serialize(&self, _out: &mut Serializer) {
        match *self {}
    }

    fn deserialize(_kind: &str, _input: &mut Deserializer) -> Option<Self> {
        None
    }
}

/// Any message exchanged between peers
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent<A = NoAppEvent> {
    Session(SessionEvent),
    Snapshot(SnapshotEvent),
    ObjectDelta(ObjectDeltaEvent),
    App(A),
}

impl<A: AppEvent> NetEvent<A> {
    /// Registry key of this event
    pub fn kind(&self) -> EventKind {
        match self {
            NetEvent::Session(_) => EventKind::Session,
            NetEvent::Snapshot(_) => EventKind::Snapshot,
            NetEvent::ObjectDelta(_) => EventKind::ObjectDelta,
            NetEvent::App(event) => EventKind::App(Cow::Borrowed(event.kind())),
        }
    }

    /// Appends this event's payload, without the frame header
    pub fn serialize_payload(&self, out: &mut Serializer) {
        match self {
            NetEvent::Session(event) => event.serialize(out),
            NetEvent::Snapshot(event) => event.serialize(out),
            NetEvent::ObjectDelta(event) => event.serialize(out),
            NetEvent::App(event) => event.serialize(out),
        }
    }

    /// Decodes a payload registered as `kind`
    pub fn deserialize_payload(kind: &EventKind, input: &mut Deserializer) -> Result<Self> {
        match kind {
            EventKind::Session => SessionEvent::deserialize(input).map(NetEvent::Session),
            EventKind::Snapshot => Ok(NetEvent::Snapshot(SnapshotEvent::deserialize(input))),
            EventKind::ObjectDelta => ObjectDeltaEvent::deserialize(input).map(NetEvent::ObjectDelta),
            EventKind::App(name) => A::deserialize(name, input)
                .map(NetEvent::App)
                .ok_or(SyncError::MalformedFrame(constants::ERR_UNDECODABLE_APP_EVENT)),
        }
    }
}

impl<A> From<SessionEvent> for NetEvent<A> {
    fn from(event: SessionEvent) -> Self {
        NetEvent::Session(event)
    }
}

impl<A> From<SnapshotEvent> for NetEvent<A> {
    fn from(event: SnapshotEvent) -> Self {
        NetEvent::Snapshot(event)
    }
}

impl<A> From<ObjectDeltaEvent> for NetEvent<A> {
    fn from(event: ObjectDeltaEvent) -> Self {
        NetEvent::ObjectDelta(event)
    }
}

/// An event together with its metadata, as handed to the application
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<A = NoAppEvent> {
    pub event: NetEvent<A>,
    pub meta: EventMeta,
}

// Session control

const SESSION_UID_ASSIGN: u8 = 1;
const SESSION_CLIENT_READY: u8 = 2;
const SESSION_GAME_START: u8 = 100;
const SESSION_GAME_RESET: u8 = 101;
const SESSION_GAME_PAUSE: u8 = 102;
const SESSION_GAME_RESUME: u8 = 103;

/// Session-phase control messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Host assigns a short id to one peer
    UidAssign(u32),
    ClientReady,
    GameStart,
    GameReset,
    GamePause,
    GameResume,
}

impl SessionEvent {
    pub fn serialize(&self, out: &mut Serializer) {
        match self {
            SessionEvent::UidAssign(short_id) => {
                out.write_u8(SESSION_UID_ASSIGN);
                out.write_u32(*short_id);
            }
            SessionEvent::ClientReady => out.write_u8(SESSION_CLIENT_READY),
            SessionEvent::GameStart => out.write_u8(SESSION_GAME_START),
            SessionEvent::GameReset => out.write_u8(SESSION_GAME_RESET),
            SessionEvent::GamePause => out.write_u8(SESSION_GAME_PAUSE),
            SessionEvent::GameResume => out.write_u8(SESSION_GAME_RESUME),
        }
    }

    pub fn deserialize(input: &mut Deserializer) -> Result<Self> {
        match input.read_u8() {
            SESSION_UID_ASSIGN => Ok(SessionEvent::UidAssign(input.read_u32())),
            SESSION_CLIENT_READY => Ok(SessionEvent::ClientReady),
            SESSION_GAME_START => Ok(SessionEvent::GameStart),
            SESSION_GAME_RESET => Ok(SessionEvent::GameReset),
            SESSION_GAME_PAUSE => Ok(SessionEvent::GamePause),
            SESSION_GAME_RESUME => Ok(SessionEvent::GameResume),
            _ => Err(SyncError::MalformedFrame(constants::ERR_UNKNOWN_SESSION_KIND)),
        }
    }
}

// Snapshots

/// Wire size of one snapshot entry: id plus six floats
const SNAPSHOT_ENTRY_LEN: usize = 8 + 6 * 4;

/// Full kinematic state of one object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSnapshot {
    pub object_id: ObjectId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,
    pub angular_velocity: f32,
}

impl ObjectSnapshot {
    pub fn of(object_id: ObjectId, obstacle: &Obstacle) -> Self {
        Self {
            object_id,
            x: obstacle.x(),
            y: obstacle.y(),
            vx: obstacle.vx(),
            vy: obstacle.vy(),
            angle: obstacle.angle(),
            angular_velocity: obstacle.angular_velocity(),
        }
    }
}

/// Batch of object states, at most one entry per object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotEvent {
    entries: Vec<ObjectSnapshot>,
    seen: HashSet<ObjectId>,
}

impl SnapshotEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most entries whose framed snapshot fits in `max_frame_bytes`
    pub fn capacity_for(max_frame_bytes: usize) -> usize {
        max_frame_bytes.saturating_sub(FRAME_HEADER_LEN + 4) / SNAPSHOT_ENTRY_LEN
    }

    /// Adds an entry; a second entry for the same object is ignored
    pub fn add(&mut self, snapshot: ObjectSnapshot) -> bool {
        if !self.seen.insert(snapshot.object_id) {
            return false;
        }
        self.entries.push(snapshot);
        true
    }

    pub fn add_obstacle(&mut self, object_id: ObjectId, obstacle: &Obstacle) -> bool {
        self.add(ObjectSnapshot::of(object_id, obstacle))
    }

    pub fn entries(&self) -> &[ObjectSnapshot] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialize(&self, out: &mut Serializer) {
        out.write_u32(self.entries.len() as u32);
        for entry in &self.entries {
            out.write_u64(entry.object_id.0);
            out.write_f32(entry.x);
            out.write_f32(entry.y);
            out.write_f32(entry.vx);
            out.write_f32(entry.vy);
            out.write_f32(entry.angle);
            out.write_f32(entry.angular_velocity);
        }
    }

    pub fn deserialize(input: &mut Deserializer) -> Self {
        let declared = input.read_u32() as usize;
        // A lying count must not drive allocation
        let count = declared.min(input.remaining() / SNAPSHOT_ENTRY_LEN);

        let mut event = Self::new();
        event.entries.reserve(count);
        for _ in 0..count {
            event.add(ObjectSnapshot {
                object_id: ObjectId(input.read_u64()),
                x: input.read_f32(),
                y: input.read_f32(),
                vx: input.read_f32(),
                vy: input.read_f32(),
                angle: input.read_f32(),
                angular_velocity: input.read_f32(),
            });
        }
        event
    }
}

// Per-field deltas

const DELTA_CREATE: u8 = 0;
const DELTA_DELETE: u8 = 1;
const DELTA_BODY_TYPE: u8 = 2;
const DELTA_POSITION: u8 = 3;
const DELTA_VELOCITY: u8 = 4;
const DELTA_ANGLE: u8 = 5;
const DELTA_ANGULAR_VELOCITY: u8 = 6;
const DELTA_BOOL_CONSTS: u8 = 7;
const DELTA_FLOAT_CONSTS: u8 = 8;

/// Creation, deletion or a single changed field of one object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectDeltaEvent {
    Create {
        factory_id: u32,
        object_id: ObjectId,
        params: Vec<u8>,
    },
    Delete {
        object_id: ObjectId,
    },
    BodyType {
        object_id: ObjectId,
        body_type: u32,
    },
    Position {
        object_id: ObjectId,
        x: f32,
        y: f32,
    },
    Velocity {
        object_id: ObjectId,
        vx: f32,
        vy: f32,
    },
    Angle {
        object_id: ObjectId,
        angle: f32,
    },
    AngularVelocity {
        object_id: ObjectId,
        angular_velocity: f32,
    },
    BoolConsts {
        object_id: ObjectId,
        values: [bool; 6],
    },
    FloatConsts {
        object_id: ObjectId,
        values: [f32; 8],
    },
}

impl ObjectDeltaEvent {
    pub fn object_id(&self) -> ObjectId {
        match self {
            ObjectDeltaEvent::Create { object_id, .. }
            | ObjectDeltaEvent::Delete { object_id }
            | ObjectDeltaEvent::BodyType { object_id, .. }
            | ObjectDeltaEvent::Position { object_id, .. }
            | ObjectDeltaEvent::Velocity { object_id, .. }
            | ObjectDeltaEvent::Angle { object_id, .. }
            | ObjectDeltaEvent::AngularVelocity { object_id, .. }
            | ObjectDeltaEvent::BoolConsts { object_id, .. }
            | ObjectDeltaEvent::FloatConsts { object_id, .. } => *object_id,
        }
    }

    /// Delta describing a recorded local write
    pub fn from_change(object_id: ObjectId, change: FieldChange) -> Self {
        match change {
            FieldChange::Position(p) => ObjectDeltaEvent::Position {
                object_id,
                x: p.x,
                y: p.y,
            },
            FieldChange::Velocity(v) => ObjectDeltaEvent::Velocity {
                object_id,
                vx: v.x,
                vy: v.y,
            },
            FieldChange::Angle(angle) => ObjectDeltaEvent::Angle { object_id, angle },
            FieldChange::AngularVelocity(angular_velocity) => ObjectDeltaEvent::AngularVelocity {
                object_id,
                angular_velocity,
            },
            FieldChange::BodyType(body_type) => ObjectDeltaEvent::BodyType {
                object_id,
                body_type: body_type.code(),
            },
            FieldChange::BoolConsts(bools) => ObjectDeltaEvent::BoolConsts {
                object_id,
                values: bools.to_array(),
            },
            FieldChange::FloatConsts(floats) => ObjectDeltaEvent::FloatConsts {
                object_id,
                values: floats.to_array(),
            },
        }
    }

    pub fn serialize(&self, out: &mut Serializer) {
        match self {
            ObjectDeltaEvent::Create {
                factory_id,
                object_id,
                params,
            } => {
                out.write_u8(DELTA_CREATE);
                out.write_u64(object_id.0);
                out.write_u32(*factory_id);
                out.write_blob(params);
            }
            ObjectDeltaEvent::Delete { object_id } => {
                out.write_u8(DELTA_DELETE);
                out.write_u64(object_id.0);
            }
            ObjectDeltaEvent::BodyType {
                object_id,
                body_type,
            } => {
                out.write_u8(DELTA_BODY_TYPE);
                out.write_u64(object_id.0);
                out.write_u32(*body_type);
            }
            ObjectDeltaEvent::Position { object_id, x, y } => {
                out.write_u8(DELTA_POSITION);
                out.write_u64(object_id.0);
                out.write_f32(*x);
                out.write_f32(*y);
            }
            ObjectDeltaEvent::Velocity { object_id, vx, vy } => {
                out.write_u8(DELTA_VELOCITY);
                out.write_u64(object_id.0);
                out.write_f32(*vx);
                out.write_f32(*vy);
            }
            ObjectDeltaEvent::Angle { object_id, angle } => {
                out.write_u8(DELTA_ANGLE);
                out.write_u64(object_id.0);
                out.write_f32(*angle);
            }
            ObjectDeltaEvent::AngularVelocity {
                object_id,
                angular_velocity,
            } => {
                out.write_u8(DELTA_ANGULAR_VELOCITY);
                out.write_u64(object_id.0);
                out.write_f32(*angular_velocity);
            }
            ObjectDeltaEvent::BoolConsts { object_id, values } => {
                out.write_u8(DELTA_BOOL_CONSTS);
                out.write_u64(object_id.0);
                for v in values {
                    out.write_bool(*v);
                }
            }
            ObjectDeltaEvent::FloatConsts { object_id, values } => {
                out.write_u8(DELTA_FLOAT_CONSTS);
                out.write_u64(object_id.0);
                for v in values {
                    out.write_f32(*v);
                }
            }
        }
    }

    pub fn deserialize(input: &mut Deserializer) -> Result<Self> {
        let kind = input.read_u8();
        let object_id = ObjectId(input.read_u64());
        let event = match kind {
            DELTA_CREATE => ObjectDeltaEvent::Create {
                object_id,
                factory_id: input.read_u32(),
                params: input.read_blob().to_vec(),
            },
            DELTA_DELETE => ObjectDeltaEvent::Delete { object_id },
            DELTA_BODY_TYPE => ObjectDeltaEvent::BodyType {
                object_id,
                body_type: input.read_u32(),
            },
            DELTA_POSITION => ObjectDeltaEvent::Position {
                object_id,
                x: input.read_f32(),
                y: input.read_f32(),
            },
            DELTA_VELOCITY => ObjectDeltaEvent::Velocity {
                object_id,
                vx: input.read_f32(),
                vy: input.read_f32(),
            },
            DELTA_ANGLE => ObjectDeltaEvent::Angle {
                object_id,
                angle: input.read_f32(),
            },
            DELTA_ANGULAR_VELOCITY => ObjectDeltaEvent::AngularVelocity {
                object_id,
                angular_velocity: input.read_f32(),
            },
            DELTA_BOOL_CONSTS => ObjectDeltaEvent::BoolConsts {
                object_id,
                values: std::array::from_fn(|_| input.read_bool()),
            },
            DELTA_FLOAT_CONSTS => ObjectDeltaEvent::FloatConsts {
                object_id,
                values: std::array::from_fn(|_| input.read_f32()),
            },
            _ => return Err(SyncError::MalformedFrame(constants::ERR_UNKNOWN_DELTA_KIND)),
        };
        Ok(event)
    }
}
