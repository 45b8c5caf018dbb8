//! Tag byte <-> event kind mapping.
//!
//! The built-in kinds always occupy tags 0, 1 and 2; application kinds follow
//! in registration order. Tags are positional, so every peer must register the
//! same kinds in the same order.

use crate::config::MAX_EVENT_KINDS;
use crate::core::codec::{Deserializer, Serializer};
use crate::core::frame;
use crate::error::{Result, SyncError};
use crate::protocol::event::{AppEvent, Envelope, EventMeta, NetEvent};
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Registry key for one event kind.
///
/// Application kinds are named; static names avoid an allocation per lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Session,
    Snapshot,
    ObjectDelta,
    App(Cow<'static, str>),
}

impl EventKind {
    pub fn name(&self) -> &str {
        match self {
            EventKind::Session => "SESSION",
            EventKind::Snapshot => "SNAPSHOT",
            EventKind::ObjectDelta => "OBJECT_DELTA",
            EventKind::App(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-controller table of registered event kinds
#[derive(Debug, Clone)]
pub struct EventRegistry {
    kinds: Vec<EventKind>,
    tags: HashMap<EventKind, u8>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    /// A registry holding only the built-in kinds
    pub fn new() -> Self {
        let mut registry = Self {
            kinds: Vec::with_capacity(8),
            tags: HashMap::new(),
        };
        for kind in [EventKind::Session, EventKind::Snapshot, EventKind::ObjectDelta] {
            let tag = registry.kinds.len() as u8;
            registry.tags.insert(kind.clone(), tag);
            registry.kinds.push(kind);
        }
        registry
    }

    /// A registry holding the built-in kinds followed by every kind of `A`
    pub fn for_app<A: AppEvent>() -> Result<Self> {
        let mut registry = Self::new();
        for name in A::kinds() {
            registry.register_app(*name)?;
        }
        Ok(registry)
    }

    /// Appends an application kind and returns its tag
    pub fn register_app(&mut self, name: impl Into<Cow<'static, str>>) -> Result<u8> {
        let kind = EventKind::App(name.into());
        if self.tags.contains_key(&kind) {
            return Err(SyncError::DuplicateEventKind(kind.name().to_string()));
        }
        if self.kinds.len() >= MAX_EVENT_KINDS {
            return Err(SyncError::RegistryFull);
        }

        let tag = self.kinds.len() as u8;
        self.tags.insert(kind.clone(), tag);
        self.kinds.push(kind);
        Ok(tag)
    }

    pub fn tag_of(&self, kind: &EventKind) -> Option<u8> {
        self.tags.get(kind).copied()
    }

    pub fn kind_of(&self, tag: u8) -> Option<&EventKind> {
        self.kinds.get(tag as usize)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Never true: the built-in kinds are always present
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Serializes an event's payload and resolves its tag. The frame header
    /// is added later so the sender tick reflects the actual send.
    pub fn encode_payload<A: AppEvent>(&self, event: &NetEvent<A>) -> Result<(u8, Bytes)> {
        let kind = event.kind();
        let tag = self
            .tag_of(&kind)
            .ok_or_else(|| SyncError::UnknownEventKind(kind.name().to_string()))?;

        let mut ser = Serializer::new();
        event.serialize_payload(&mut ser);
        Ok((tag, ser.freeze()))
    }

    /// Builds a complete frame for `event`
    pub fn wrap<A: AppEvent>(&self, event: &NetEvent<A>, sender_tick: u64) -> Result<Bytes> {
        let (tag, payload) = self.encode_payload(event)?;
        Ok(frame::wrap(tag, sender_tick, &payload))
    }

    /// Decodes a complete frame received from `source_id`
    pub fn unwrap<A: AppEvent>(
        &self,
        bytes: &[u8],
        receive_tick: u64,
        source_id: &str,
    ) -> Result<Envelope<A>> {
        let (header, payload) = frame::unwrap_header(bytes)?;
        let kind = self
            .kind_of(header.tag)
            .ok_or(SyncError::UnknownEventTag(header.tag))?;

        let mut de = Deserializer::from_bytes(Bytes::copy_from_slice(payload));
        let event = NetEvent::deserialize_payload(kind, &mut de)?;

        Ok(Envelope {
            event,
            meta: EventMeta {
                sender_tick: header.sender_tick,
                receive_tick,
                source_id: source_id.to_string(),
            },
        })
    }
}
