//! Shared fixtures for the integration tests: an application event type and
//! helpers that drive a host and its clients through the handshake on a
//! `LocalHub`.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use netphys::config::NetConfig;
use netphys::core::codec::{Deserializer, Serializer};
use netphys::physics::{BasicWorld, BodyFactory};
use netphys::protocol::{AppEvent, Phase};
use netphys::service::NetEventController;
use netphys::transport::LocalHub;

/// Application events used across the tests
#[derive(Debug, Clone, PartialEq)]
pub enum Chat {
    Say(u32),
    Blob(Vec<u8>),
}

impl AppEvent for Chat {
    fn kinds() -> &'static [&'static str] {
        &["SAY", "BLOB"]
    }

    fn kind(&self) -> &'static str {
        match self {
            Chat::Say(_) => "SAY",
            Chat::Blob(_) => "BLOB",
        }
    }

    fn serialize(&self, out: &mut Serializer) {
        match self {
            Chat::Say(n) => out.write_u32(*n),
            Chat::Blob(bytes) => out.write_blob(bytes),
        }
    }

    fn deserialize(kind: &str, input: &mut Deserializer) -> Option<Self> {
        match kind {
            "SAY" => Some(Chat::Say(input.read_u32())),
            "BLOB" => Some(Chat::Blob(input.read_blob().to_vec())),
            _ => None,
        }
    }
}

pub type Peer = NetEventController<LocalHub, BasicWorld, Chat>;

/// Factory id of `BodyFactory` on every peer built here
pub const BODY_FACTORY: u32 = 0;

pub fn peer(hub: &LocalHub, config: NetConfig) -> Peer {
    let mut peer = Peer::new(config, hub.clone(), BasicWorld::new()).expect("valid config");
    assert_eq!(peer.register_obstacle_factory(BodyFactory), BODY_FACTORY);
    peer
}

pub struct Session {
    pub hub: LocalHub,
    pub host: Peer,
    pub clients: Vec<Peer>,
}

impl Session {
    /// Host plus `clients` peers, connected and session-established but not ready
    pub fn in_session(clients: usize, config: NetConfig) -> Self {
        let hub = LocalHub::new();
        let mut host = peer(&hub, config.clone());
        assert!(host.connect_as_host());
        host.update();
        assert_eq!(host.phase(), Phase::Connected);
        let room = host.room_id().expect("host has a room").to_string();

        let mut joined = Vec::new();
        for _ in 0..clients {
            let mut client = peer(&hub, config.clone());
            assert!(client.connect_as_client(&room));
            client.update();
            assert_eq!(client.phase(), Phase::Connected);
            joined.push(client);
        }

        hub.establish_session(&room).expect("room exists");
        let mut session = Self {
            hub,
            host,
            clients: joined,
        };
        session.tick();
        assert_eq!(session.host.phase(), Phase::InSession);
        for client in &session.clients {
            assert_eq!(client.phase(), Phase::InSession);
            assert_ne!(client.short_id(), 0);
        }
        session
    }

    /// Host plus `clients` peers, all in game
    pub fn in_game(clients: usize, config: NetConfig) -> Self {
        let mut session = Self::in_session(clients, config);
        for client in &mut session.clients {
            assert!(client.mark_ready());
        }
        assert!(session.host.mark_ready());
        session.tick();
        assert_eq!(session.host.phase(), Phase::InGame);
        for client in &session.clients {
            assert_eq!(client.phase(), Phase::InGame);
        }
        session
    }

    /// One update on the host, then on every client
    pub fn tick(&mut self) {
        self.host.update();
        for client in &mut self.clients {
            client.update();
        }
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn room(&self) -> String {
        self.host.room_id().expect("host has a room").to_string()
    }
}
