//! In-process transport.
//!
//! A [`LocalHub`] hosts rooms whose members exchange frames through per-peer
//! `tokio` unbounded channels. Receiving never blocks: frames are drained with
//! `try_recv` from the controller's tick, so no runtime is needed.
//!
//! The hub also plays the role of the matchmaking service: the test or demo
//! decides when a room's session is established and can force any peer into
//! a failure state.

use crate::error::{constants, Result, SyncError};
use crate::transport::{Connection, ConnectionState, Connector};
use bytes::Bytes;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument, warn};

type Mailbox = UnboundedSender<(String, Bytes)>;

#[derive(Debug)]
struct Room {
    host: String,
    members: Vec<String>,
}

#[derive(Debug)]
struct PeerSlot {
    mailbox: Mailbox,
    state: ConnectionState,
    room: String,
}

#[derive(Debug, Default)]
struct HubState {
    rooms: HashMap<String, Room>,
    peers: HashMap<String, PeerSlot>,
    next_peer: u64,
}

/// Shared registry of local rooms; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct LocalHub {
    inner: Arc<Mutex<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HubState>> {
        self.inner
            .lock()
            .map_err(|_| SyncError::Transport(constants::ERR_HUB_POISONED.into()))
    }

    /// Marks every current member of `room_id` as session-established
    #[instrument(skip(self))]
    pub fn establish_session(&self, room_id: &str) -> Result<()> {
        let mut hub = self.lock()?;
        let members = hub
            .rooms
            .get(room_id)
            .map(|room| room.members.clone())
            .ok_or_else(|| SyncError::Transport(constants::ERR_ROOM_NOT_FOUND.into()))?;

        for member in &members {
            if let Some(slot) = hub.peers.get_mut(member) {
                slot.state = ConnectionState::SessionEstablished;
            }
        }
        info!(room = room_id, members = members.len(), "Session established");
        Ok(())
    }

    /// Forces the state one peer observes, e.g. to inject a failure
    pub fn set_state(&self, peer_id: &str, state: ConnectionState) -> Result<()> {
        let mut hub = self.lock()?;
        let slot = hub
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| SyncError::Transport(format!("Unknown peer: {peer_id}")))?;
        slot.state = state;
        Ok(())
    }

    pub fn rooms(&self) -> Vec<String> {
        self.lock()
            .map(|hub| hub.rooms.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Members of a room, host first
    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.lock()
            .ok()
            .and_then(|hub| hub.rooms.get(room_id).map(|room| room.members.clone()))
            .unwrap_or_default()
    }

    pub fn host_connection(&self) -> LocalConnection {
        LocalConnection::new(self.clone(), None)
    }

    pub fn client_connection(&self, room_id: &str) -> LocalConnection {
        LocalConnection::new(self.clone(), Some(room_id.to_string()))
    }

    fn join(&self, room_id: Option<&str>) -> Result<(String, String, UnboundedReceiver<(String, Bytes)>)> {
        let mut hub = self.lock()?;
        hub.next_peer += 1;
        let peer_id = format!("peer-{:04}", hub.next_peer);

        let room_id = match room_id {
            Some(room_id) => {
                let room = hub
                    .rooms
                    .get_mut(room_id)
                    .ok_or_else(|| SyncError::Transport(constants::ERR_ROOM_NOT_FOUND.into()))?;
                room.members.push(peer_id.clone());
                room_id.to_string()
            }
            None => {
                let mut rng = rand::rng();
                let mut room_id = format!("{:08x}", rng.random::<u32>());
                while hub.rooms.contains_key(&room_id) {
                    room_id = format!("{:08x}", rng.random::<u32>());
                }
                hub.rooms.insert(
                    room_id.clone(),
                    Room {
                        host: peer_id.clone(),
                        members: vec![peer_id.clone()],
                    },
                );
                room_id
            }
        };

        let (mailbox, inbox) = mpsc::unbounded_channel();
        hub.peers.insert(
            peer_id.clone(),
            PeerSlot {
                mailbox,
                state: ConnectionState::Connected,
                room: room_id.clone(),
            },
        );
        debug!(peer = %peer_id, room = %room_id, "Joined room");
        Ok((peer_id, room_id, inbox))
    }

    fn leave(&self, peer_id: &str) {
        let Ok(mut hub) = self.lock() else {
            return;
        };
        let Some(slot) = hub.peers.remove(peer_id) else {
            return;
        };

        let mut orphaned = Vec::new();
        if let Some(room) = hub.rooms.get_mut(&slot.room) {
            room.members.retain(|m| m != peer_id);
            if room.host == peer_id {
                orphaned = std::mem::take(&mut room.members);
            }
        }
        if !orphaned.is_empty() || hub.rooms.get(&slot.room).is_some_and(|r| r.members.is_empty()) {
            hub.rooms.remove(&slot.room);
        }
        for member in orphaned {
            if let Some(other) = hub.peers.get_mut(&member) {
                other.state = ConnectionState::Disconnected;
            }
        }
        debug!(peer = peer_id, room = %slot.room, "Left room");
    }

    fn state_of(&self, peer_id: &str) -> ConnectionState {
        self.lock()
            .ok()
            .and_then(|hub| hub.peers.get(peer_id).map(|slot| slot.state))
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn peers_of(&self, peer_id: &str) -> Vec<String> {
        let Ok(hub) = self.lock() else {
            return Vec::new();
        };
        hub.peers
            .get(peer_id)
            .and_then(|slot| hub.rooms.get(&slot.room))
            .map(|room| room.members.iter().filter(|m| *m != peer_id).cloned().collect())
            .unwrap_or_default()
    }

    fn deliver(&self, from: &str, to: Option<&str>, frame: &[u8]) -> Result<()> {
        let hub = self.lock()?;
        let room = hub
            .peers
            .get(from)
            .and_then(|slot| hub.rooms.get(&slot.room))
            .ok_or_else(|| SyncError::Transport(constants::ERR_NO_CONNECTION.into()))?;

        let frame = Bytes::copy_from_slice(frame);
        for member in room.members.iter().filter(|m| *m != from) {
            if to.is_some_and(|target| target != member) {
                continue;
            }
            if let Some(slot) = hub.peers.get(member) {
                if slot.mailbox.send((from.to_string(), frame.clone())).is_err() {
                    warn!(peer = %member, "Mailbox closed, frame lost");
                }
            }
        }
        Ok(())
    }
}

impl Connector for LocalHub {
    type Connection = LocalConnection;

    fn host(&mut self) -> LocalConnection {
        self.host_connection()
    }

    fn client(&mut self, room_id: &str) -> LocalConnection {
        self.client_connection(room_id)
    }
}

/// One peer's membership in a [`LocalHub`] room
#[derive(Debug)]
pub struct LocalConnection {
    hub: LocalHub,
    join_room: Option<String>,
    peer_id: Option<String>,
    room_id: Option<String>,
    inbox: Option<UnboundedReceiver<(String, Bytes)>>,
}

impl LocalConnection {
    fn new(hub: LocalHub, join_room: Option<String>) -> Self {
        Self {
            hub,
            join_room,
            peer_id: None,
            room_id: None,
            inbox: None,
        }
    }

    /// This peer's id once open
    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }
}

impl Connection for LocalConnection {
    fn open(&mut self) -> Result<()> {
        if self.peer_id.is_some() {
            return Ok(());
        }
        let (peer_id, room_id, inbox) = self.hub.join(self.join_room.as_deref())?;
        self.peer_id = Some(peer_id);
        self.room_id = Some(room_id);
        self.inbox = Some(inbox);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(peer_id) = self.peer_id.take() {
            self.hub.leave(&peer_id);
        }
        self.inbox = None;
    }

    fn state(&self) -> ConnectionState {
        match &self.peer_id {
            Some(peer_id) => self.hub.state_of(peer_id),
            None if self.room_id.is_some() => ConnectionState::Disconnected,
            None => ConnectionState::Negotiating,
        }
    }

    fn broadcast(&mut self, frame: &[u8]) -> Result<()> {
        let from = self
            .peer_id
            .as_deref()
            .ok_or_else(|| SyncError::Transport(constants::ERR_NO_CONNECTION.into()))?;
        self.hub.deliver(from, None, frame)
    }

    fn send_to(&mut self, peer_id: &str, frame: &[u8]) -> Result<()> {
        let from = self
            .peer_id
            .as_deref()
            .ok_or_else(|| SyncError::Transport(constants::ERR_NO_CONNECTION.into()))?;
        self.hub.deliver(from, Some(peer_id), frame)
    }

    fn receive(&mut self, on_frame: &mut dyn FnMut(&str, &[u8])) {
        let Some(inbox) = self.inbox.as_mut() else {
            return;
        };
        loop {
            match inbox.try_recv() {
                Ok((from, frame)) => on_frame(&from, &frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Inbox disconnected");
                    break;
                }
            }
        }
    }

    fn peers(&self) -> Vec<String> {
        self.peer_id
            .as_deref()
            .map(|peer_id| self.hub.peers_of(peer_id))
            .unwrap_or_default()
    }

    fn room_id(&self) -> Option<String> {
        self.room_id.clone()
    }
}

impl Drop for LocalConnection {
    fn drop(&mut self) {
        self.close();
    }
}
