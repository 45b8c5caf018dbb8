//! Session handshake state machine.
//!
//! Drives one peer from connection through short-id assignment and the ready
//! barrier into the running game. The state machine does no I/O: every input
//! returns the [`SessionAction`]s the controller has to carry out.
//!
//! ```text
//! Idle -> Connecting -> Connected -> InSession -> Ready -> InGame
//!                  \__________\___________\________\________\__> NetError
//! ```
//!
//! **Per-Controller State**
//! Each controller owns its own [`SessionState`]; nothing is global, so several
//! peers can run side by side in one process.

use crate::protocol::event::SessionEvent;
use crate::transport::ConnectionState;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Short id the host always takes for itself
pub const HOST_SHORT_ID: u32 = 1;

/// Short id meaning "not assigned yet"
pub const UNASSIGNED_SHORT_ID: u32 = 0;

/// Lifecycle phase of one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    Connected,
    InSession,
    Ready,
    InGame,
    NetError,
}

impl Phase {
    /// Whether a connection exists in this phase
    pub fn is_live(self) -> bool {
        !matches!(self, Phase::Idle | Phase::NetError)
    }
}

/// Side effect requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send to every other peer now, bypassing the outbound queue
    Broadcast(SessionEvent),
    /// Send to one peer now
    SendTo(String, SessionEvent),
    /// Hand the event to the application inbound queue
    Notify(SessionEvent),
    /// Drop all in-flight reconciliation state
    ResetPhysics,
}

/// Handshake progress and session flags of one peer
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    phase: Phase,
    is_host: bool,
    short_id: u32,
    ready_peers: HashSet<String>,
    epoch: u64,
    paused: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn short_id(&self) -> u32 {
        self.short_id
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Tick at which the game started; 0 before that
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of distinct peers that reported ready to the host
    pub fn ready_count(&self) -> usize {
        self.ready_peers.len()
    }

    /// Starts connecting. Only valid from `Idle`.
    pub fn begin(&mut self, is_host: bool) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.is_host = is_host;
        self.set_phase(Phase::Connecting);
        true
    }

    /// Back to `Idle` with every session flag cleared
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!(from = ?self.phase, to = ?phase, host = self.is_host, "Session phase changed");
            self.phase = phase;
        }
    }

    /// Advances on the transport's current state; at most one forward step per call.
    ///
    /// `peers` is only consulted when the host enters `InSession` and hands
    /// out short ids.
    pub fn on_connection_state(&mut self, state: ConnectionState, peers: &[String]) -> Vec<SessionAction> {
        if state.is_failure() {
            if self.phase.is_live() {
                warn!(?state, phase = ?self.phase, "Connection lost");
                self.set_phase(Phase::NetError);
            }
            return Vec::new();
        }

        match (self.phase, state) {
            (Phase::Connecting, ConnectionState::Connected | ConnectionState::SessionEstablished) => {
                self.set_phase(Phase::Connected);
                Vec::new()
            }
            (Phase::Connected, ConnectionState::SessionEstablished) => {
                self.set_phase(Phase::InSession);
                if self.is_host {
                    self.short_id = HOST_SHORT_ID;
                    assign_short_ids(peers)
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// Declares this peer ready.
    ///
    /// Valid only in `InSession` once a short id is known. Clients announce it
    /// to everyone; the host just waits on the barrier.
    pub fn mark_ready(&mut self, peer_count: usize, tick: u64) -> Option<Vec<SessionAction>> {
        if self.phase != Phase::InSession || self.short_id == UNASSIGNED_SHORT_ID {
            return None;
        }
        self.set_phase(Phase::Ready);

        if self.is_host {
            Some(self.check_barrier(peer_count, tick))
        } else {
            Some(vec![SessionAction::Broadcast(SessionEvent::ClientReady)])
        }
    }

    /// Host-issued pause, resume or reset; valid only for the host in game
    pub fn host_control(&mut self, event: SessionEvent) -> Option<Vec<SessionAction>> {
        if !self.is_host || self.phase != Phase::InGame {
            return None;
        }
        let mut actions = vec![SessionAction::Broadcast(event)];
        actions.extend(self.apply_game_control(event));
        Some(actions)
    }

    /// Handles one inbound session event from `source_id`
    pub fn on_session_event(
        &mut self,
        event: SessionEvent,
        source_id: &str,
        peer_count: usize,
        tick: u64,
    ) -> Vec<SessionAction> {
        match event {
            SessionEvent::UidAssign(short_id) => {
                if !self.is_host && self.phase.is_live() {
                    debug!(short_id, "Short id assigned");
                    self.short_id = short_id;
                }
                Vec::new()
            }
            SessionEvent::ClientReady => {
                if !self.is_host || !self.phase.is_live() || self.phase == Phase::InGame {
                    return Vec::new();
                }
                if self.ready_peers.insert(source_id.to_string()) {
                    debug!(peer = source_id, ready = self.ready_peers.len(), peer_count, "Peer ready");
                }
                self.check_barrier(peer_count, tick)
            }
            SessionEvent::GameStart => {
                if self.phase == Phase::Ready {
                    self.start_game(tick);
                }
                Vec::new()
            }
            SessionEvent::GamePause | SessionEvent::GameResume | SessionEvent::GameReset => {
                if self.is_host || self.phase != Phase::InGame {
                    return Vec::new();
                }
                self.apply_game_control(event)
            }
        }
    }

    /// Re-evaluates the ready barrier against the current peer count, so a
    /// peer that leaves before reporting ready no longer holds the game back
    pub fn poll_barrier(&mut self, peer_count: usize, tick: u64) -> Vec<SessionAction> {
        self.check_barrier(peer_count, tick)
    }

    fn check_barrier(&mut self, peer_count: usize, tick: u64) -> Vec<SessionAction> {
        if !self.is_host || self.phase != Phase::Ready || self.ready_peers.len() < peer_count {
            return Vec::new();
        }
        self.start_game(tick);
        vec![SessionAction::Broadcast(SessionEvent::GameStart)]
    }

    fn start_game(&mut self, tick: u64) {
        self.epoch = tick;
        self.paused = false;
        self.set_phase(Phase::InGame);
    }

    fn apply_game_control(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        match event {
            SessionEvent::GamePause => self.paused = true,
            SessionEvent::GameResume => self.paused = false,
            SessionEvent::GameReset => {
                return vec![SessionAction::ResetPhysics, SessionAction::Notify(event)];
            }
            _ => return Vec::new(),
        }
        vec![SessionAction::Notify(event)]
    }
}

/// `UidAssign(2..)` for every peer, in sorted peer order
fn assign_short_ids(peers: &[String]) -> Vec<SessionAction> {
    let mut sorted: Vec<&String> = peers.iter().collect();
    sorted.sort();
    sorted
        .into_iter()
        .zip(HOST_SHORT_ID + 1..)
        .map(|(peer, short_id)| SessionAction::SendTo(peer.clone(), SessionEvent::UidAssign(short_id)))
        .collect()
}
