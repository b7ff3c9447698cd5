//! Cross-client scenarios over a shared cross-tab hub.
//!
//! Each test drives two or more coordinators attached to one hub with a zero
//! visibility delay, pumping `update()` by hand where the real consumers
//! would pump from their tick loop.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use parlor_protocol::{ConnectionState, GameId, SessionId, SessionState};
use parlor_session::{
    CoordinatorConfig, CrossTabHub, EventKind, SessionCoordinator, SessionError, SessionEvent,
};

fn hub() -> CrossTabHub {
    CrossTabHub::with_delay(Duration::ZERO)
}

fn client(hub: &CrossTabHub) -> SessionCoordinator {
    SessionCoordinator::new(hub.endpoint(), CoordinatorConfig::default())
}

fn record(
    coordinator: &mut SessionCoordinator,
    kind: EventKind,
) -> Rc<RefCell<Vec<SessionEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    coordinator.on(kind, move |event| sink.borrow_mut().push(event.clone()));
    log
}

/// Host creates, guest joins, host syncs back, both settle on one roster.
#[test]
fn join_reconciles_against_the_host_snapshot() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host
        .create_session(Some(GameId::new("tic-tac-toe")), 2, "Alice")
        .unwrap();
    let host_id = host.local_player_id().cloned().unwrap();

    let joined = record(&mut guest, EventKind::SessionJoined);
    let connected = record(&mut host, EventKind::PlayerConnected);

    guest.join_session(session.id.clone(), "Bob").unwrap();
    let guest_id = guest.local_player_id().cloned().unwrap();

    // Optimistic: the guest adopts a provisional session before any reply.
    assert_eq!(joined.borrow().len(), 1);
    assert!(!guest.is_connected());
    assert!(guest.current_session().unwrap().host_id.is_none());

    // Host observes the join and answers with its snapshot.
    host.update();
    assert_eq!(connected.borrow().len(), 1);
    let host_view = host.current_session().unwrap();
    assert_eq!(host_view.player_count(), 2);
    assert!(host_view.player(&guest_id).is_some());

    // Guest drains its own join echo and the sync, in that order.
    guest.update();
    let guest_view = guest.current_session().unwrap();
    assert_eq!(guest_view.host_id, Some(host_id));
    assert_eq!(guest_view.max_players, 2);
    assert_eq!(guest_view.game_id, Some(GameId::new("tic-tac-toe")));
    assert_eq!(guest_view.player_count(), 2);

    // Own entry stays ours: connected, not the host echo's stale value.
    let me = guest_view.player(&guest_id).unwrap();
    assert_eq!(me.connection, ConnectionState::Connected);
    assert!(guest.is_connected());
    assert!(!guest.is_host());
}

#[test]
fn ready_state_propagates_to_peers() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    guest.join_session(session.id.clone(), "Bob").unwrap();
    let guest_id = guest.local_player_id().cloned().unwrap();
    host.update();
    guest.update();

    let changes = record(&mut host, EventKind::PlayerReadyChanged);
    guest.set_player_ready(true).unwrap();
    host.update();

    let host_view = host.current_session().unwrap();
    assert!(host_view.player(&guest_id).unwrap().ready);
    let changes = changes.borrow();
    assert_eq!(changes.len(), 1);
    assert!(matches!(
        &changes[0],
        SessionEvent::PlayerReadyChanged { player_id, ready: true } if *player_id == guest_id
    ));
}

#[test]
fn game_start_reaches_every_participant() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    guest.join_session(session.id.clone(), "Bob").unwrap();
    host.update();
    guest.update();

    let host_started = record(&mut host, EventKind::GameStarted);
    let guest_started = record(&mut guest, EventKind::GameStarted);

    host.start_game(GameId::new("tic-tac-toe")).unwrap();
    host.update();
    guest.update();

    let host_view = host.current_session().unwrap();
    assert_eq!(host_view.state, SessionState::Playing);
    assert_eq!(host_view.game_id, Some(GameId::new("tic-tac-toe")));

    let guest_view = guest.current_session().unwrap();
    assert_eq!(guest_view.state, SessionState::Playing);
    assert_eq!(guest_view.game_id, Some(GameId::new("tic-tac-toe")));

    // Host fires optimistically and again on its own echo; the guest sees
    // exactly the relayed one.
    assert!(!host_started.borrow().is_empty());
    let guest_started = guest_started.borrow();
    assert_eq!(guest_started.len(), 1);
    assert!(matches!(
        &guest_started[0],
        SessionEvent::GameStarted { game_id } if game_id.as_str() == "tic-tac-toe"
    ));
}

#[test]
fn guest_moves_relay_to_the_host() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    guest.join_session(session.id.clone(), "Bob").unwrap();
    let guest_id = guest.local_player_id().cloned().unwrap();
    host.update();
    guest.update();
    host.start_game(GameId::new("tic-tac-toe")).unwrap();
    guest.update();

    let moves = record(&mut host, EventKind::GameMoveReceived);
    guest
        .send_game_move(json!({"row": 0, "col": 0, "player": "X"}))
        .unwrap();
    host.update();

    let moves = moves.borrow();
    assert_eq!(moves.len(), 1);
    match &moves[0] {
        SessionEvent::GameMoveReceived {
            sender,
            game_id,
            mv,
        } => {
            assert_eq!(*sender, guest_id);
            assert_eq!(*game_id, Some(GameId::new("tic-tac-toe")));
            assert_eq!(*mv, json!({"row": 0, "col": 0, "player": "X"}));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn only_the_host_broadcasts_full_state() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    guest.join_session(session.id.clone(), "Bob").unwrap();
    host.update();
    guest.update();

    let host_states = record(&mut host, EventKind::GameStateUpdated);
    let guest_states = record(&mut guest, EventKind::GameStateUpdated);

    assert_eq!(
        guest.send_game_state(json!({"board": []})),
        Err(SessionError::NotHost)
    );
    host.update();
    assert!(host_states.borrow().is_empty(), "nothing was broadcast");

    host.send_game_state(json!({"board": ["X"]})).unwrap();
    guest.update();
    let guest_states = guest_states.borrow();
    assert_eq!(guest_states.len(), 1);
    assert!(matches!(
        &guest_states[0],
        SessionEvent::GameStateUpdated { state, .. } if state["board"][0] == "X"
    ));
}

/// Messages scoped to another session produce no events and no mutation.
#[test]
fn foreign_session_messages_are_ignored() {
    let hub = hub();
    let mut a = client(&hub);
    let mut b = client(&hub);

    a.create_session(None, 4, "Alice").unwrap();
    b.create_session(None, 4, "Bob").unwrap();

    let ready_on_b = record(&mut b, EventKind::PlayerReadyChanged);
    let connected_on_b = record(&mut b, EventKind::PlayerConnected);
    let before = b.current_session().cloned().unwrap();

    a.set_player_ready(true).unwrap();
    b.update();

    assert!(ready_on_b.borrow().is_empty());
    assert!(connected_on_b.borrow().is_empty());
    assert_eq!(b.current_session().cloned().unwrap(), before);
}

#[test]
fn joins_beyond_capacity_are_dropped() {
    let hub = hub();
    let mut host = client(&hub);
    let mut first = client(&hub);
    let mut second = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    first.join_session(session.id.clone(), "Bob").unwrap();
    host.update();
    first.update();

    let connected = record(&mut host, EventKind::PlayerConnected);
    second.join_session(session.id.clone(), "Carol").unwrap();
    host.update();
    second.update();

    assert!(connected.borrow().is_empty());
    assert_eq!(host.current_session().unwrap().player_count(), 2);

    // No sync ever targets the overflow joiner; it stays provisional.
    assert!(!second.is_connected());
    assert!(second.current_session().unwrap().host_id.is_none());
}

/// A join link routed back into `join_session` lands in the right session.
#[test]
fn session_url_round_trips_through_join() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 4, "Alice").unwrap();
    let url = host.session_url().unwrap();
    let (_, id) = url.rsplit_once("#/multiplayer/join/").unwrap();
    assert_eq!(id, session.id.as_str());

    guest.join_session(SessionId::new(id), "Bob").unwrap();
    host.update();
    guest.update();

    assert!(guest.is_connected());
    assert_eq!(
        guest.current_session().map(|s| s.id.clone()),
        Some(session.id.clone())
    );
}

/// Leaving tears the session down silently; peers keep their stale roster.
#[test]
fn leaving_does_not_notify_peers() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    guest.join_session(session.id.clone(), "Bob").unwrap();
    let guest_id = guest.local_player_id().cloned().unwrap();
    host.update();
    guest.update();

    guest.leave_session();
    host.update();

    // No departure message exists on the wire.
    assert!(host.current_session().unwrap().player(&guest_id).is_some());
    assert!(guest.current_session().is_none());

    // The departed client can immediately host a fresh session.
    let fresh = guest.create_session(None, 4, "Bob").unwrap();
    assert!(guest.is_host());
    assert_ne!(fresh.id, session.id);
}

/// An unrelated writer on the shared channel cannot break the session.
#[test]
fn junk_on_the_channel_is_ignored() {
    let hub = hub();
    let mut host = client(&hub);
    let mut guest = client(&hub);

    let session = host.create_session(None, 2, "Alice").unwrap();
    hub.publish_raw("{\"theme\": \"dark\"}");
    guest.join_session(session.id.clone(), "Bob").unwrap();
    hub.publish_raw("not even json");
    host.update();
    guest.update();

    assert!(guest.is_connected());
    assert_eq!(host.current_session().unwrap().player_count(), 2);
}

#[test]
fn pending_messages_become_visible_after_the_relay_delay() {
    let hub = CrossTabHub::with_delay(Duration::from_millis(40));
    let mut host = SessionCoordinator::new(hub.endpoint(), CoordinatorConfig::default());
    let mut guest = SessionCoordinator::new(hub.endpoint(), CoordinatorConfig::default());

    let session = host.create_session(None, 2, "Alice").unwrap();
    guest.join_session(session.id.clone(), "Bob").unwrap();

    host.update();
    assert_eq!(
        host.current_session().unwrap().player_count(),
        1,
        "nothing is visible before the delay"
    );

    std::thread::sleep(Duration::from_millis(50));
    host.update();
    assert_eq!(host.current_session().unwrap().player_count(), 2);
}
