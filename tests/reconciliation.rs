//! Integration tests for shared-object reconciliation across peers:
//! creation, convergence, duplicate delivery and property propagation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{peer, Session, BODY_FACTORY};
use netphys::config::{NetConfig, SnapshotMode};
use netphys::physics::{
    encode_params, BodyParams, BodyType, ObjectId, ObstacleWorld, SharedGuard, Vec2,
};
use netphys::protocol::event::{ObjectDeltaEvent, SnapshotEvent};
use netphys::protocol::{EventRegistry, NetEvent, NoAppEvent, Phase};
use netphys::transport::{Connection, LocalHub};
use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

fn spawn_on_host(session: &mut Session, at: Vec2) -> ObjectId {
    let params = encode_params(&BodyParams::at(at.x, at.y)).expect("params");
    let id = session
        .host
        .create_shared_obstacle(BODY_FACTORY, params)
        .expect("created");
    session.tick();
    id
}

#[test]
fn test_create_reaches_every_client() {
    let mut session = Session::in_game(2, NetConfig::default());
    let created = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&created);
    session.clients[0].set_on_remote_create(move |id, _| sink.borrow_mut().push(id));

    let id = spawn_on_host(&mut session, Vec2::new(1.0, 2.0));
    assert_eq!(id.owner(), 1);
    for client in &session.clients {
        let body = client.world().get(id).expect("replicated");
        assert!(body.is_shared());
        assert_eq!(body.position(), Vec2::new(1.0, 2.0));
    }
    assert_eq!(*created.borrow(), vec![id]);
}

#[test]
fn test_create_before_game_is_held_back() {
    let mut session = Session::in_session(1, NetConfig::default());
    let params = encode_params(&BodyParams::default()).expect("params");
    let id = session
        .host
        .create_shared_obstacle(BODY_FACTORY, params)
        .expect("created");
    session.tick();
    assert!(!session.clients[0].world().contains(id));
    assert_eq!(session.host.outbound_len(), 1);
}

#[test]
fn test_client_converges_on_host_move() {
    let mut session = Session::in_game(1, NetConfig::default());
    let id = spawn_on_host(&mut session, Vec2::ZERO);

    session
        .host
        .world_mut()
        .get_mut(id)
        .expect("host body")
        .set_position(Vec2::new(0.5, -0.25));
    session.tick();
    assert!(session.clients[0].physics().target(id).is_some());

    session.ticks(30);
    let client_body = session.clients[0].world().get(id).expect("client body");
    assert_eq!(client_body.position(), Vec2::new(0.5, -0.25));
    assert_eq!(session.clients[0].physics().active_interpolations(), 0);
}

#[test]
fn test_client_write_is_not_echoed_back() {
    let mut session = Session::in_game(1, NetConfig::default());
    let id = spawn_on_host(&mut session, Vec2::ZERO);

    session.clients[0]
        .world_mut()
        .get_mut(id)
        .expect("client body")
        .set_angle(1.25);
    session.ticks(40);

    let host_body = session.host.world().get(id).expect("host body");
    assert_eq!(host_body.angle(), 1.25);
    // the host corrected silently, so nothing flows back and forth
    assert_eq!(session.host.physics().active_interpolations(), 0);
    assert!(!host_body.has_changes());
}

#[test]
fn test_properties_apply_immediately() {
    let mut session = Session::in_game(1, NetConfig::default());
    let id = spawn_on_host(&mut session, Vec2::ZERO);

    {
        let body = session.host.world_mut().get_mut(id).expect("host body");
        body.set_body_type(BodyType::Kinematic);
        body.set_friction(0.9);
    }
    session.tick();

    let client_body = session.clients[0].world().get(id).expect("client body");
    assert_eq!(client_body.body_type(), BodyType::Kinematic);
    assert_eq!(client_body.float_consts().friction, 0.9);
}

#[test]
fn test_delete_propagates() {
    let mut session = Session::in_game(1, NetConfig::default());
    let id = spawn_on_host(&mut session, Vec2::ZERO);
    session.host.delete_shared_obstacle(id).expect("exists");
    session.tick();
    assert!(!session.clients[0].world().contains(id));
}

#[test]
fn test_duplicate_delivery_is_idempotent() {
    let config = NetConfig::default_with_overrides(|c| c.snapshot.mode = SnapshotMode::Off);
    let mut session = Session::in_game(1, config);
    let id = spawn_on_host(&mut session, Vec2::ZERO);

    // A third peer that replays the same delta twice
    let mut replayer = session.hub.client_connection(&session.room());
    replayer.open().expect("joins");
    let registry = EventRegistry::new();
    let delta: NetEvent<NoAppEvent> = NetEvent::ObjectDelta(ObjectDeltaEvent::Position {
        object_id: id,
        x: 3.0,
        y: 0.0,
    });
    let frame = registry.wrap(&delta, 1).expect("wrap");
    replayer.broadcast(&frame).expect("send");
    replayer.broadcast(&frame).expect("send");
    session.tick();

    let stats = session.clients[0].physics().stats();
    assert_eq!(stats.started, 1);
    assert_eq!(stats.replaced, 0);

    session.ticks(30);
    let client_body = session.clients[0].world().get(id).expect("client body");
    assert_eq!(client_body.position(), Vec2::new(3.0, 0.0));
}

#[test]
fn test_physics_before_game_goes_to_application() {
    let mut session = Session::in_session(1, NetConfig::default());
    let mut injector = session.hub.client_connection(&session.room());
    injector.open().expect("joins");

    let registry = EventRegistry::new();
    let frame = registry
        .wrap::<NoAppEvent>(&NetEvent::Snapshot(SnapshotEvent::new()), 0)
        .expect("wrap");
    injector.broadcast(&frame).expect("send");
    session.tick();

    assert_eq!(session.clients[0].phase(), Phase::InSession);
    let env = session.clients[0].poll_inbound().expect("routed to application");
    assert!(matches!(env.event, NetEvent::Snapshot(_)));
}

#[test]
fn test_init_objects_agree_without_traffic() {
    let mut session = Session::in_session(1, NetConfig::default());
    let params = encode_params(&BodyParams::at(4.0, 4.0)).expect("params");
    let sent_before = session.host.metrics().snapshot().frames_sent;

    let on_host = session
        .host
        .create_init_obstacle(BODY_FACTORY, &params)
        .expect("created");
    let on_client = session.clients[0]
        .create_init_obstacle(BODY_FACTORY, &params)
        .expect("created");
    assert_eq!(on_host, on_client);
    assert!(on_host.is_init());
    assert_eq!(session.host.outbound_len(), 0);
    assert_eq!(session.host.metrics().snapshot().frames_sent, sent_before);
}

#[test]
fn test_init_ids_match_fresh_peer_after_reconnect() {
    let hub = LocalHub::new();
    let params = encode_params(&BodyParams::default()).expect("params");

    let mut returning = peer(&hub, NetConfig::default());
    let first = returning
        .create_init_obstacle(BODY_FACTORY, &params)
        .expect("created");
    returning.disconnect();
    returning.world_mut().remove(first);
    let rebuilt = returning
        .create_init_obstacle(BODY_FACTORY, &params)
        .expect("created");

    let mut fresh = peer(&hub, NetConfig::default());
    let on_fresh = fresh
        .create_init_obstacle(BODY_FACTORY, &params)
        .expect("created");
    assert_eq!(rebuilt, first);
    assert_eq!(rebuilt, on_fresh);
}

#[test]
fn test_snapshots_fit_a_small_byte_ceiling() {
    let config = NetConfig::default_with_overrides(|c| {
        c.session.max_outbound_bytes = 1024;
        c.snapshot.rotation_window = 64;
    });
    assert!(config.validate().is_empty());
    let mut session = Session::in_game(1, config);

    let params = encode_params(&BodyParams::default()).expect("params");
    let ids: Vec<ObjectId> = (0..40)
        .map(|_| {
            session
                .host
                .create_shared_obstacle(BODY_FACTORY, params.clone())
                .expect("created")
        })
        .collect();
    session.ticks(20);
    assert!(ids.iter().all(|id| session.clients[0].world().contains(*id)));

    // Silent local drift that only snapshots can correct
    for id in &ids {
        let body = session.clients[0].world_mut().get_mut(*id).expect("client body");
        SharedGuard::new(body).set_position(Vec2::new(5.0, 0.0));
    }
    session.ticks(60);

    assert!(session.clients[0].physics().stats().started > 0);
    for id in &ids {
        let body = session.clients[0].world().get(*id).expect("client body");
        assert_eq!(body.position(), Vec2::ZERO);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_client_converges_to_host(
        x in -50.0f32..50.0,
        y in -50.0f32..50.0,
        angle in -3.0f32..3.0,
    ) {
        let mut session = Session::in_game(1, NetConfig::default());
        let id = spawn_on_host(&mut session, Vec2::ZERO);

        {
            let body = session.host.world_mut().get_mut(id).expect("host body");
            body.set_position(Vec2::new(x, y));
            body.set_angle(angle);
        }
        session.ticks(32);

        let host_body = session.host.world().get(id).expect("host body").clone();
        let client_body = session.clients[0].world().get(id).expect("client body");
        prop_assert_eq!(client_body.position(), host_body.position());
        prop_assert_eq!(client_body.angle(), host_body.angle());
    }
}
