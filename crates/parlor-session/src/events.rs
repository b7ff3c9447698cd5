//! Typed events and the multi-listener subscription registry.
//!
//! Several commands emit their event optimistically, before the relayed
//! message round-trips back; the echo may re-emit the same kind with
//! peer-observed state. Subscribers should treat emissions as
//! latest-wins notifications, not as exactly-once deliveries.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use serde_json::Value;
use tracing::error;

use parlor_protocol::{GameId, Player, PlayerId, Session};

/// Events delivered to subscribers, locally-originated and remote alike.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A session was created locally; the local player is its host.
    SessionCreated { session: Session },
    /// A provisional session was adopted locally; the local player is a
    /// guest and the roster is reconciled once the host's sync arrives.
    SessionJoined { session: Session },
    /// A previously unknown player appeared in the roster.
    PlayerConnected { player: Player },
    /// Reserved: no departure notification exists on the wire today.
    PlayerDisconnected { player_id: PlayerId },
    /// A player's ready flag changed.
    PlayerReadyChanged { player_id: PlayerId, ready: bool },
    /// The host picked a game.
    GameSelected { game_id: GameId },
    /// The host started the game; the session is now playing.
    GameStarted { game_id: GameId },
    /// A relayed move arrived. The sender's own echo arrives here too.
    GameMoveReceived {
        sender: PlayerId,
        game_id: Option<GameId>,
        mv: Value,
    },
    /// A full game state broadcast arrived from the host.
    GameStateUpdated { sender: PlayerId, state: Value },
    /// The host ended the game. Local emission only; peers are not told.
    GameEnded { game_id: Option<GameId> },
    /// The relay refused a publish.
    ConnectionError { message: String },
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::SessionCreated { .. } => EventKind::SessionCreated,
            SessionEvent::SessionJoined { .. } => EventKind::SessionJoined,
            SessionEvent::PlayerConnected { .. } => EventKind::PlayerConnected,
            SessionEvent::PlayerDisconnected { .. } => EventKind::PlayerDisconnected,
            SessionEvent::PlayerReadyChanged { .. } => EventKind::PlayerReadyChanged,
            SessionEvent::GameSelected { .. } => EventKind::GameSelected,
            SessionEvent::GameStarted { .. } => EventKind::GameStarted,
            SessionEvent::GameMoveReceived { .. } => EventKind::GameMoveReceived,
            SessionEvent::GameStateUpdated { .. } => EventKind::GameStateUpdated,
            SessionEvent::GameEnded { .. } => EventKind::GameEnded,
            SessionEvent::ConnectionError { .. } => EventKind::ConnectionError,
        }
    }
}

/// Subscription key: the fieldless discriminant of [`SessionEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionCreated,
    SessionJoined,
    PlayerConnected,
    PlayerDisconnected,
    PlayerReadyChanged,
    GameSelected,
    GameStarted,
    GameMoveReceived,
    GameStateUpdated,
    GameEnded,
    ConnectionError,
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Rc<RefCell<dyn FnMut(&SessionEvent)>>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    callback: Callback,
}

/// Multi-listener registry keyed by event kind.
///
/// Callbacks run synchronously, in subscription order. Emission iterates a
/// snapshot of the matching listeners, so subscribing or unsubscribing from
/// inside a callback never affects the in-flight emission. A panicking
/// callback is logged and isolated; the remaining callbacks still run.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: RefCell<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.borrow_mut().push(Listener {
            id,
            kind,
            callback: Rc::new(RefCell::new(callback)),
        });
        id
    }

    /// Remove a listener. Returns `false` if the handle was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Invoke every listener registered for `event`'s kind.
    pub fn emit(&self, event: &SessionEvent) {
        let snapshot: Vec<Callback> = self
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.kind == event.kind())
            .map(|listener| Rc::clone(&listener.callback))
            .collect();

        for callback in snapshot {
            let mut callback = callback.borrow_mut();
            let outcome = catch_unwind(AssertUnwindSafe(|| (&mut *callback)(event)));
            if outcome.is_err() {
                error!(kind = ?event.kind(), "event listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}
