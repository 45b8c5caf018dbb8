//! # Session Controller
//!
//! [`NetEventController`] is the single entry point a game drives once per
//! fixed tick. Each [`update`](NetEventController::update):
//!
//! 1. advances the tick counter
//! 2. polls the transport and advances the session phase
//! 3. drains received frames and routes each decoded event
//! 4. in game and not paused, runs the reconciliation step and produces a snapshot
//! 5. in game, sends queued frames within the per-tick ceilings
//!
//! Nothing escapes `update()` as an error: malformed frames are logged and
//! counted, transport failures become [`Phase::NetError`].

use crate::config::{NetConfig, SnapshotMode};
use crate::core::frame;
use crate::error::{Result, SyncError};
use crate::physics::controller::NetPhysicsController;
use crate::physics::factory::ObstacleFactory;
use crate::physics::ids::ObjectId;
use crate::physics::obstacle::Obstacle;
use crate::physics::world::ObstacleWorld;
use crate::protocol::dispatcher::{route, InboundQueue, Route};
use crate::protocol::event::{AppEvent, Envelope, EventMeta, NetEvent, NoAppEvent, SessionEvent};
use crate::protocol::handshake::{Phase, SessionAction, SessionState};
use crate::protocol::registry::EventRegistry;
use crate::transport::{Connection, ConnectionState, Connector};
use crate::utils::metrics::SyncMetrics;
use bytes::Bytes;
use std::borrow::Cow;
use std::collections::VecDeque;
use tracing::{debug, info, instrument, warn};

/// A serialized payload waiting for its send tick
#[derive(Debug)]
struct QueuedFrame {
    tag: u8,
    payload: Bytes,
    deferred: bool,
}

impl QueuedFrame {
    fn framed_len(&self) -> usize {
        frame::framed_len(self.payload.len())
    }
}

/// Session controller for one peer
pub struct NetEventController<K, W, A = NoAppEvent>
where
    K: Connector,
    W: ObstacleWorld,
    A: AppEvent,
{
    config: NetConfig,
    connector: K,
    connection: Option<K::Connection>,
    registry: EventRegistry,
    session: SessionState,
    physics: NetPhysicsController,
    world: W,
    outbound: VecDeque<QueuedFrame>,
    inbound: InboundQueue<A>,
    room_id: Option<String>,
    tick: u64,
    metrics: SyncMetrics,
}

impl<K, W, A> NetEventController<K, W, A>
where
    K: Connector,
    W: ObstacleWorld,
    A: AppEvent,
{
    /// Validates `config` and registers every kind of `A` after the built-ins
    pub fn new(config: NetConfig, connector: K, world: W) -> Result<Self> {
        config.validate_strict()?;
        let registry = EventRegistry::for_app::<A>()?;
        let physics =
            NetPhysicsController::new(config.interpolation.clone(), config.snapshot.clone())
                .with_snapshot_budget(config.session.max_outbound_bytes);
        let inbound = InboundQueue::new(config.session.max_inbound_queue);

        Ok(Self {
            config,
            connector,
            connection: None,
            registry,
            session: SessionState::new(),
            physics,
            world,
            outbound: VecDeque::new(),
            inbound,
            room_id: None,
            tick: 0,
            metrics: SyncMetrics::new(),
        })
    }

    /// Registers an extra application kind name and returns its tag
    pub fn register_event_kind(&mut self, name: impl Into<Cow<'static, str>>) -> Result<u8> {
        self.registry.register_app(name)
    }

    // Connection lifecycle

    #[instrument(skip(self))]
    pub fn connect_as_host(&mut self) -> bool {
        if self.session.phase() == Phase::NetError {
            self.disconnect();
        }
        if !self.session.begin(true) {
            return false;
        }
        let connection = self.connector.host();
        self.open(connection)
    }

    #[instrument(skip(self))]
    pub fn connect_as_client(&mut self, room_id: &str) -> bool {
        if self.session.phase() == Phase::NetError {
            self.disconnect();
        }
        if !self.session.begin(false) {
            return false;
        }
        self.room_id = Some(room_id.to_string());
        let connection = self.connector.client(room_id);
        self.open(connection)
    }

    fn open(&mut self, mut connection: K::Connection) -> bool {
        match connection.open() {
            Ok(()) => {
                self.connection = Some(connection);
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to open connection");
                self.session.on_connection_state(ConnectionState::Failed, &[]);
                false
            }
        }
    }

    /// Closes the connection and clears all session state
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            info!(room = ?self.room_id, "Disconnected");
        }
        self.session.reset();
        self.physics.reset();
        self.physics.reset_init_ids();
        self.physics.set_owner(0);
        self.outbound.clear();
        self.inbound.clear();
        self.room_id = None;
    }

    /// Declares this peer ready. Valid in `InSession` once a short id is known.
    pub fn mark_ready(&mut self) -> bool {
        let peer_count = self.peer_count();
        match self.session.mark_ready(peer_count, self.tick) {
            Some(actions) => {
                self.run_actions(actions, &EventMeta::local(self.game_tick()));
                true
            }
            None => false,
        }
    }

    /// Host only: suspends reconciliation on every peer
    pub fn pause_game(&mut self) -> Result<()> {
        self.host_control(SessionEvent::GamePause)
    }

    pub fn resume_game(&mut self) -> Result<()> {
        self.host_control(SessionEvent::GameResume)
    }

    /// Host only: drops in-flight reconciliation on every peer
    pub fn reset_game(&mut self) -> Result<()> {
        self.host_control(SessionEvent::GameReset)
    }

    fn host_control(&mut self, event: SessionEvent) -> Result<()> {
        let actions = self
            .session
            .host_control(event)
            .ok_or(SyncError::InvalidPhase(self.session.phase()))?;
        self.run_actions(actions, &EventMeta::local(self.game_tick()));
        Ok(())
    }

    // Per-tick driver

    pub fn update(&mut self) {
        self.tick += 1;
        self.poll_connection();
        self.receive_frames();

        if self.session.phase() == Phase::InGame && !self.session.is_paused() {
            self.physics.fixed_update(&mut self.world);
        }
        self.collect_physics_outbound();

        if self.session.phase() == Phase::InGame {
            if !self.session.is_paused() {
                self.produce_snapshot();
            }
            self.drain_outbound();
        }
    }

    fn poll_connection(&mut self) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        let state = connection.state();
        let before = self.session.phase();
        let peers = if before == Phase::Connected && self.session.is_host() {
            connection.peers()
        } else {
            Vec::new()
        };

        let actions = self.session.on_connection_state(state, &peers);
        if before == Phase::Connecting && self.session.phase() == Phase::Connected && self.session.is_host() {
            self.room_id = connection.room_id();
            info!(room = ?self.room_id, "Hosting room");
        }
        self.physics.set_owner(self.session.short_id());
        self.run_actions(actions, &EventMeta::local(self.game_tick()));

        if self.session.phase() == Phase::Ready && self.session.is_host() {
            let peer_count = self.peer_count();
            let actions = self.session.poll_barrier(peer_count, self.tick);
            self.run_actions(actions, &EventMeta::local(self.game_tick()));
        }
    }

    fn receive_frames(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        let mut frames: Vec<(String, Bytes)> = Vec::new();
        connection.receive(&mut |from, frame| {
            frames.push((from.to_string(), Bytes::copy_from_slice(frame)));
        });

        for (from, frame) in frames {
            self.handle_frame(&from, &frame);
        }
    }

    fn handle_frame(&mut self, from: &str, frame: &[u8]) {
        self.metrics.frame_received(frame.len());
        match self.registry.unwrap::<A>(frame, self.game_tick(), from) {
            Ok(envelope) => self.dispatch(envelope),
            Err(e) => {
                warn!(peer = from, len = frame.len(), error = %e, "Discarding frame");
                self.metrics.malformed_frame();
            }
        }
    }

    fn dispatch(&mut self, envelope: Envelope<A>) {
        let Envelope { event, meta } = envelope;
        match (route(&event, self.session.phase()), event) {
            (Route::Session, NetEvent::Session(event)) => {
                let peer_count = self.peer_count();
                let actions =
                    self.session
                        .on_session_event(event, &meta.source_id, peer_count, self.tick);
                self.physics.set_owner(self.session.short_id());
                self.run_actions(actions, &meta);
            }
            (Route::Physics, NetEvent::ObjectDelta(delta)) => {
                if !self.physics.handle_delta(&mut self.world, delta, &meta) {
                    self.metrics.ignored_event();
                }
            }
            (Route::Physics, NetEvent::Snapshot(snapshot)) => {
                if self.physics.handle_snapshot(&mut self.world, &snapshot, &meta) < snapshot.len() {
                    self.metrics.ignored_event();
                }
            }
            (_, event) => self.push_inbound(Envelope { event, meta }),
        }
    }

    fn run_actions(&mut self, actions: Vec<SessionAction>, meta: &EventMeta) {
        for action in actions {
            match action {
                SessionAction::Broadcast(event) => self.send_session(None, event),
                SessionAction::SendTo(peer, event) => self.send_session(Some(&peer), event),
                SessionAction::Notify(event) => self.push_inbound(Envelope {
                    event: NetEvent::Session(event),
                    meta: meta.clone(),
                }),
                SessionAction::ResetPhysics => self.physics.reset(),
            }
        }
    }

    /// Session control bypasses the outbound queue
    fn send_session(&mut self, to: Option<&str>, event: SessionEvent) {
        let frame = match self.registry.wrap::<A>(&NetEvent::Session(event), self.game_tick()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, ?event, "Failed to encode session event");
                return;
            }
        };
        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        let result = match to {
            Some(peer) => connection.send_to(peer, &frame),
            None => connection.broadcast(&frame),
        };
        match result {
            Ok(()) => {
                debug!(?event, to = ?to, "Sent session event");
                self.metrics.frame_sent(frame.len());
            }
            Err(e) => {
                warn!(error = %e, ?event, "Failed to send session event");
                self.metrics.send_error();
            }
        }
    }

    fn push_inbound(&mut self, envelope: Envelope<A>) {
        self.metrics.app_event();
        if let Some(evicted) = self.inbound.push(envelope) {
            warn!(kind = %evicted.event.kind(), "Inbound queue full, dropped oldest event");
            self.metrics.app_event_dropped();
        }
    }

    // Outbound

    /// Queues an event for broadcast. The event is serialized now; its sender
    /// tick is stamped when it actually leaves.
    pub fn enqueue_outbound(&mut self, event: impl Into<NetEvent<A>>) -> Result<()> {
        let event = event.into();
        let (tag, payload) = self.registry.encode_payload(&event)?;
        let queued = QueuedFrame {
            tag,
            payload,
            deferred: false,
        };

        let framed_len = queued.framed_len();
        if framed_len > self.config.session.max_outbound_bytes {
            return Err(SyncError::OversizedFrame(framed_len));
        }
        self.outbound.push_back(queued);
        Ok(())
    }

    /// Queues an application event for broadcast
    pub fn send_app(&mut self, event: A) -> Result<()> {
        self.enqueue_outbound(NetEvent::App(event))
    }

    fn collect_physics_outbound(&mut self) {
        for event in self.physics.take_outbound() {
            if let Err(e) = self.enqueue_outbound(event) {
                warn!(error = %e, "Dropping physics event");
            }
        }
    }

    fn produce_snapshot(&mut self) {
        let snapshot_config = &self.config.snapshot;
        let producer = match snapshot_config.mode {
            SnapshotMode::Host => self.session.is_host(),
            SnapshotMode::All => true,
            SnapshotMode::Off => false,
        };
        if !producer || self.game_tick() % snapshot_config.interval_ticks != 0 {
            return;
        }

        let snapshot = self.physics.pack_snapshot(&self.world);
        if snapshot.is_empty() {
            return;
        }
        if let Err(e) = self.enqueue_outbound(NetEvent::Snapshot(snapshot)) {
            warn!(error = %e, "Dropping snapshot");
        }
    }

    /// Sends queued frames in order until the next one would break a ceiling
    fn drain_outbound(&mut self) {
        let max_messages = self.config.session.max_outbound_messages;
        let max_bytes = self.config.session.max_outbound_bytes;
        let sender_tick = self.game_tick();
        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        let mut sent = 0usize;
        let mut bytes = 0usize;
        while let Some(next) = self.outbound.front() {
            let len = next.framed_len();
            if sent >= max_messages || bytes + len > max_bytes {
                break;
            }
            let Some(queued) = self.outbound.pop_front() else {
                break;
            };

            let frame = frame::wrap(queued.tag, sender_tick, &queued.payload);
            match connection.broadcast(&frame) {
                Ok(()) => self.metrics.frame_sent(frame.len()),
                Err(e) => {
                    warn!(error = %e, "Failed to send frame");
                    self.metrics.send_error();
                }
            }
            sent += 1;
            bytes += len;
        }

        if !self.outbound.is_empty() {
            debug!(sent, bytes, deferred = self.outbound.len(), "Outbound ceiling reached");
            // Each frame counts once, on the first tick it misses
            let mut newly_deferred = 0;
            for queued in self.outbound.iter_mut().filter(|q| !q.deferred) {
                queued.deferred = true;
                newly_deferred += 1;
            }
            self.metrics.deferred(newly_deferred);
        }
    }

    /// Next event waiting for the application, oldest first
    pub fn poll_inbound(&mut self) -> Option<Envelope<A>> {
        self.inbound.pop()
    }

    // Shared objects

    /// Registers an obstacle factory. Every peer must register the same
    /// factories in the same order.
    pub fn register_obstacle_factory<F: ObstacleFactory + 'static>(&mut self, factory: F) -> u32 {
        self.physics.register_factory(factory)
    }

    /// Called with every obstacle created by a remote peer
    pub fn set_on_remote_create<F>(&mut self, hook: F)
    where
        F: FnMut(ObjectId, &Obstacle) + 'static,
    {
        self.physics.set_on_remote_create(hook);
    }

    /// Creates an obstacle owned by this peer and announces it to the others
    pub fn create_shared_obstacle(&mut self, factory_id: u32, params: Vec<u8>) -> Result<ObjectId> {
        self.physics.create_shared(&mut self.world, factory_id, params)
    }

    /// Creates a scene obstacle that every peer builds in the same order
    pub fn create_init_obstacle(&mut self, factory_id: u32, params: &[u8]) -> Result<ObjectId> {
        self.physics.create_init(&mut self.world, factory_id, params)
    }

    pub fn delete_shared_obstacle(&mut self, object_id: ObjectId) -> Result<Obstacle> {
        self.physics.delete_shared(&mut self.world, object_id)
    }

    // Accessors

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn is_host(&self) -> bool {
        self.session.is_host()
    }

    /// This peer's short id; 0 until assigned
    pub fn short_id(&self) -> u32 {
        self.session.short_id()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Ticks since the game started; equal to `tick()` before that
    pub fn game_tick(&self) -> u64 {
        self.tick.saturating_sub(self.session.epoch())
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    pub fn peer_count(&self) -> usize {
        self.connection.as_ref().map_or(0, |c| c.peer_count())
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn physics(&self) -> &NetPhysicsController {
        &self.physics
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn connection(&self) -> Option<&K::Connection> {
        self.connection.as_ref()
    }
}
