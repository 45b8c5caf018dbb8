// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::protocol::event::SessionEvent;
use crate::protocol::handshake::*;
use crate::transport::ConnectionState;

fn peers(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn host_in_session(peer_ids: &[&str]) -> (SessionState, Vec<SessionAction>) {
    let mut host = SessionState::new();
    assert!(host.begin(true));
    let peer_ids = peers(peer_ids);
    assert!(host
        .on_connection_state(ConnectionState::Connected, &peer_ids)
        .is_empty());
    let actions = host.on_connection_state(ConnectionState::SessionEstablished, &peer_ids);
    assert_eq!(host.phase(), Phase::InSession);
    (host, actions)
}

#[test]
fn test_one_transition_per_poll() {
    let mut client = SessionState::new();
    client.begin(false);
    client.on_connection_state(ConnectionState::SessionEstablished, &[]);
    assert_eq!(client.phase(), Phase::Connected);
    client.on_connection_state(ConnectionState::SessionEstablished, &[]);
    assert_eq!(client.phase(), Phase::InSession);
}

#[test]
fn test_host_assigns_sorted_short_ids() {
    let (host, actions) = host_in_session(&["c", "a", "b"]);
    assert_eq!(host.short_id(), HOST_SHORT_ID);
    assert_eq!(
        actions,
        vec![
            SessionAction::SendTo("a".into(), SessionEvent::UidAssign(2)),
            SessionAction::SendTo("b".into(), SessionEvent::UidAssign(3)),
            SessionAction::SendTo("c".into(), SessionEvent::UidAssign(4)),
        ]
    );
}

#[test]
fn test_client_mark_ready_requires_short_id() {
    let mut client = SessionState::new();
    client.begin(false);
    client.on_connection_state(ConnectionState::Connected, &[]);
    client.on_connection_state(ConnectionState::SessionEstablished, &[]);
    assert!(client.mark_ready(1, 0).is_none());

    client.on_session_event(SessionEvent::UidAssign(2), "host", 1, 0);
    let actions = client.mark_ready(1, 0).expect("ready accepted");
    assert_eq!(actions, vec![SessionAction::Broadcast(SessionEvent::ClientReady)]);
    assert_eq!(client.phase(), Phase::Ready);
}

#[test]
fn test_uid_assign_can_overtake_session_poll() {
    let mut client = SessionState::new();
    client.begin(false);
    client.on_connection_state(ConnectionState::Connected, &[]);
    client.on_session_event(SessionEvent::UidAssign(5), "host", 1, 0);
    assert_eq!(client.short_id(), 5);
}

#[test]
fn test_host_ignores_uid_assign() {
    let (mut host, _) = host_in_session(&["a"]);
    host.on_session_event(SessionEvent::UidAssign(9), "a", 1, 0);
    assert_eq!(host.short_id(), HOST_SHORT_ID);
}

#[test]
fn test_ready_barrier_waits_for_every_peer() {
    let (mut host, _) = host_in_session(&["a", "b"]);
    assert!(host.mark_ready(2, 10).expect("host ready").is_empty());
    assert_eq!(host.phase(), Phase::Ready);

    assert!(host.on_session_event(SessionEvent::ClientReady, "a", 2, 11).is_empty());
    // duplicate ready from the same peer counts once
    assert!(host.on_session_event(SessionEvent::ClientReady, "a", 2, 12).is_empty());
    assert_eq!(host.ready_count(), 1);

    let actions = host.on_session_event(SessionEvent::ClientReady, "b", 2, 13);
    assert_eq!(actions, vec![SessionAction::Broadcast(SessionEvent::GameStart)]);
    assert_eq!(host.phase(), Phase::InGame);
    assert_eq!(host.epoch(), 13);
}

#[test]
fn test_barrier_checked_on_host_ready() {
    let (mut host, _) = host_in_session(&["a"]);
    host.on_session_event(SessionEvent::ClientReady, "a", 1, 3);
    assert_eq!(host.phase(), Phase::InSession);

    let actions = host.mark_ready(1, 4).expect("host ready");
    assert_eq!(actions, vec![SessionAction::Broadcast(SessionEvent::GameStart)]);
    assert_eq!(host.phase(), Phase::InGame);
}

#[test]
fn test_barrier_rechecked_after_peer_leaves() {
    let (mut host, _) = host_in_session(&["a", "b"]);
    host.mark_ready(2, 1).expect("host ready");
    assert!(host.on_session_event(SessionEvent::ClientReady, "a", 2, 2).is_empty());
    assert!(host.poll_barrier(2, 3).is_empty());
    assert_eq!(host.phase(), Phase::Ready);

    // "b" left without reporting ready
    let actions = host.poll_barrier(1, 4);
    assert_eq!(actions, vec![SessionAction::Broadcast(SessionEvent::GameStart)]);
    assert_eq!(host.phase(), Phase::InGame);
    assert!(host.poll_barrier(1, 5).is_empty());
}

#[test]
fn test_game_start_only_from_ready() {
    let mut client = SessionState::new();
    client.begin(false);
    client.on_connection_state(ConnectionState::Connected, &[]);
    client.on_connection_state(ConnectionState::SessionEstablished, &[]);
    client.on_session_event(SessionEvent::GameStart, "host", 1, 5);
    assert_eq!(client.phase(), Phase::InSession);

    client.on_session_event(SessionEvent::UidAssign(2), "host", 1, 5);
    client.mark_ready(1, 6);
    client.on_session_event(SessionEvent::GameStart, "host", 1, 7);
    assert_eq!(client.phase(), Phase::InGame);
    assert_eq!(client.epoch(), 7);
}

#[test]
fn test_failure_forces_net_error() {
    let (mut host, _) = host_in_session(&["a"]);
    host.on_connection_state(ConnectionState::Failed, &[]);
    assert_eq!(host.phase(), Phase::NetError);

    let mut idle = SessionState::new();
    idle.on_connection_state(ConnectionState::Disconnected, &[]);
    assert_eq!(idle.phase(), Phase::Idle);
}

#[test]
fn test_host_controls_only_in_game() {
    let (mut host, _) = host_in_session(&[]);
    assert!(host.host_control(SessionEvent::GamePause).is_none());

    host.mark_ready(0, 1);
    assert_eq!(host.phase(), Phase::InGame);
    let actions = host.host_control(SessionEvent::GamePause).expect("in game");
    assert_eq!(
        actions,
        vec![
            SessionAction::Broadcast(SessionEvent::GamePause),
            SessionAction::Notify(SessionEvent::GamePause),
        ]
    );
    assert!(host.is_paused());

    let actions = host.host_control(SessionEvent::GameReset).expect("in game");
    assert!(actions.contains(&SessionAction::ResetPhysics));
}

#[test]
fn test_client_applies_remote_pause() {
    let mut client = SessionState::new();
    client.begin(false);
    client.on_connection_state(ConnectionState::Connected, &[]);
    client.on_connection_state(ConnectionState::SessionEstablished, &[]);
    client.on_session_event(SessionEvent::UidAssign(2), "host", 1, 0);
    client.mark_ready(1, 0);
    client.on_session_event(SessionEvent::GameStart, "host", 1, 1);

    let actions = client.on_session_event(SessionEvent::GamePause, "host", 1, 2);
    assert_eq!(actions, vec![SessionAction::Notify(SessionEvent::GamePause)]);
    assert!(client.is_paused());
    client.on_session_event(SessionEvent::GameResume, "host", 1, 3);
    assert!(!client.is_paused());
}

#[test]
fn test_reset_clears_everything() {
    let (mut host, _) = host_in_session(&["a"]);
    host.on_session_event(SessionEvent::ClientReady, "a", 1, 0);
    host.reset();
    assert_eq!(host.phase(), Phase::Idle);
    assert_eq!(host.short_id(), UNASSIGNED_SHORT_ID);
    assert_eq!(host.ready_count(), 0);
    assert!(!host.is_host());
}
