//! The session coordinator.
//!
//! Owns the lifecycle of at most one session for the local client and relays
//! player/game state between peers. All commands mutate local state
//! synchronously; delivery to peers happens when each client next calls
//! [`SessionCoordinator::update`], after the transport's visibility delay.
//! Holding one session at a time is intentional scope, not a limitation.

use serde_json::Value;
use tracing::{debug, warn};

use parlor_protocol::{
    now_millis, ConnectionState, GameId, MessagePayload, Player, PlayerId, PlayerRole,
    RelayMessage, Session, SessionId, SessionState,
};

use crate::config::CoordinatorConfig;
use crate::error::SessionError;
use crate::events::{EventBus, EventKind, ListenerId, SessionEvent};
use crate::transport::RelayTransport;

/// Coordinates session membership, the player roster, and message relay for
/// one client. Construct one per client and pass it where it is needed; there
/// is no global instance.
pub struct SessionCoordinator {
    transport: Box<dyn RelayTransport>,
    config: CoordinatorConfig,
    bus: EventBus,
    session: Option<Session>,
    local_player: Option<PlayerId>,
    role: Option<PlayerRole>,
    inbox: Vec<RelayMessage>,
}

impl SessionCoordinator {
    pub fn new(transport: impl RelayTransport + 'static, config: CoordinatorConfig) -> Self {
        Self {
            transport: Box::new(transport),
            config,
            bus: EventBus::new(),
            session: None,
            local_player: None,
            role: None,
            inbox: Vec::new(),
        }
    }

    // --- Commands ---

    /// Create a session with the caller as host.
    ///
    /// Construction is local: no message is broadcast, and the session is
    /// returned synchronously. Emits `session-created`.
    pub fn create_session(
        &mut self,
        game_id: Option<GameId>,
        max_players: u8,
        host_name: &str,
    ) -> Result<Session, SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyInSession);
        }

        let max_players = max_players.max(1);
        let player_id = PlayerId::generate();
        let host = Player {
            id: player_id.clone(),
            name: host_name.to_string(),
            role: PlayerRole::Host,
            connection: ConnectionState::Connected,
            ready: false,
            joined_at: now_millis(),
            transport: self.transport.kind(),
        };
        let session = Session {
            id: SessionId::generate(),
            game_id,
            host_id: Some(player_id.clone()),
            players: vec![host],
            max_players,
            state: SessionState::Waiting,
            created_at: now_millis(),
        };

        self.session = Some(session.clone());
        self.local_player = Some(player_id);
        self.role = Some(PlayerRole::Host);
        self.bus.emit(&SessionEvent::SessionCreated {
            session: session.clone(),
        });
        Ok(session)
    }

    /// Create a session using the configured default capacity.
    pub fn create_session_default(
        &mut self,
        game_id: Option<GameId>,
        host_name: &str,
    ) -> Result<Session, SessionError> {
        let max_players = self.config.default_max_players;
        self.create_session(game_id, max_players, host_name)
    }

    /// Join an existing session as a guest.
    ///
    /// The returned session is provisional: host and game are unknown and the
    /// local player is `Connecting` until the host's sync response arrives.
    /// Broadcasts `player-join` and emits `session-joined` immediately; the
    /// UI is not expected to block on host acknowledgment.
    pub fn join_session(
        &mut self,
        session_id: SessionId,
        player_name: &str,
    ) -> Result<Session, SessionError> {
        if self.session.is_some() {
            return Err(SessionError::AlreadyInSession);
        }

        let player_id = PlayerId::generate();
        let me = Player {
            id: player_id.clone(),
            name: player_name.to_string(),
            role: PlayerRole::Guest,
            connection: ConnectionState::Connecting,
            ready: false,
            joined_at: now_millis(),
            transport: self.transport.kind(),
        };
        let session = Session {
            id: session_id,
            game_id: None,
            host_id: None,
            players: vec![me.clone()],
            // Placeholder until the host's sync carries the real capacity.
            max_players: self.config.default_max_players,
            state: SessionState::Waiting,
            created_at: now_millis(),
        };

        self.session = Some(session.clone());
        self.local_player = Some(player_id);
        self.role = Some(PlayerRole::Guest);

        self.broadcast(MessagePayload::PlayerJoin { player: me });
        self.bus.emit(&SessionEvent::SessionJoined {
            session: session.clone(),
        });
        Ok(session)
    }

    /// Leave the current session. No-op when none is held.
    ///
    /// Peers are not notified: no departure message exists on the wire, so
    /// other participants keep the stale roster entry (see DESIGN.md).
    pub fn leave_session(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.transport.release();
        self.session = None;
        self.local_player = None;
        self.role = None;
    }

    /// Relay one in-game action to every participant.
    ///
    /// Pure relay: local state is untouched, and the sender's own echo comes
    /// back through `game-move-received` like everyone else's. A game reducer
    /// either applies moves on echo only, or skips echoes carrying its own
    /// player id.
    pub fn send_game_move(&mut self, mv: Value) -> Result<(), SessionError> {
        let game_id = match &self.session {
            Some(session) => session.game_id.clone(),
            None => return Err(SessionError::NotInSession),
        };
        self.broadcast(MessagePayload::GameMove { game_id, mv });
        Ok(())
    }

    /// Broadcast a full game state. Host only.
    pub fn send_game_state(&mut self, state: Value) -> Result<(), SessionError> {
        self.require_host()?;
        self.broadcast(MessagePayload::GameState { state });
        Ok(())
    }

    /// Flip the local player's ready flag.
    ///
    /// Optimistic: the local roster copy is updated and
    /// `player-ready-changed` emitted before the broadcast echo returns.
    pub fn set_player_ready(&mut self, ready: bool) -> Result<(), SessionError> {
        let player_id = self
            .local_player
            .clone()
            .ok_or(SessionError::NotInSession)?;
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::NotInSession);
        };
        if let Some(me) = session.player_mut(&player_id) {
            me.ready = ready;
        }

        self.broadcast(MessagePayload::PlayerReady { ready });
        self.bus
            .emit(&SessionEvent::PlayerReadyChanged { player_id, ready });
        Ok(())
    }

    /// Pick the game the session will play. Host only.
    pub fn select_game(&mut self, game_id: GameId) -> Result<(), SessionError> {
        self.require_host()?;
        if let Some(session) = self.session.as_mut() {
            session.game_id = Some(game_id.clone());
        }
        self.broadcast(MessagePayload::GameSelect {
            game_id: game_id.clone(),
        });
        self.bus.emit(&SessionEvent::GameSelected { game_id });
        Ok(())
    }

    /// Start a game and move the session to `Playing`. Host only.
    pub fn start_game(&mut self, game_id: GameId) -> Result<(), SessionError> {
        self.require_host()?;
        if let Some(session) = self.session.as_mut() {
            session.game_id = Some(game_id.clone());
            session.state = SessionState::Playing;
        }
        self.broadcast(MessagePayload::GameStart {
            game_id: game_id.clone(),
        });
        self.bus.emit(&SessionEvent::GameStarted { game_id });
        Ok(())
    }

    /// Move the session to `Ended` and emit `game-ended`. Host only.
    ///
    /// Local emission only: the wire kind set has no game-end message, so
    /// peers are not notified (the same gap as departures, see DESIGN.md).
    pub fn end_game(&mut self) -> Result<(), SessionError> {
        self.require_host()?;
        let mut game_id = None;
        if let Some(session) = self.session.as_mut() {
            session.state = SessionState::Ended;
            game_id = session.game_id.clone();
        }
        self.bus.emit(&SessionEvent::GameEnded { game_id });
        Ok(())
    }

    // --- Event subscription ---

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&SessionEvent) + 'static,
    {
        self.bus.on(kind, callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.bus.off(id)
    }

    // --- Queries ---

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn local_player_id(&self) -> Option<&PlayerId> {
        self.local_player.as_ref()
    }

    pub fn is_host(&self) -> bool {
        self.role == Some(PlayerRole::Host)
    }

    /// Whether the local player's own roster entry reads `Connected`.
    pub fn is_connected(&self) -> bool {
        match (&self.session, &self.local_player) {
            (Some(session), Some(id)) => session
                .player(id)
                .is_some_and(|p| p.connection == ConnectionState::Connected),
            _ => false,
        }
    }

    /// Join deep-link for the current session, for the consuming UI to route
    /// back into [`Self::join_session`].
    pub fn session_url(&self) -> Option<String> {
        self.session.as_ref().map(|session| {
            format!(
                "{}#/multiplayer/join/{}",
                self.config.join_link_base, session.id
            )
        })
    }

    // --- Relay pump ---

    /// Drain the transport and dispatch every message that has become
    /// visible. Consumers call this from their tick/animation loop.
    pub fn update(&mut self) {
        let mut inbox = std::mem::take(&mut self.inbox);
        self.transport.drain(&mut inbox);
        for message in inbox.drain(..) {
            self.dispatch(message);
        }
        self.inbox = inbox;
    }

    // --- Internals ---

    fn require_host(&self) -> Result<(), SessionError> {
        if self.session.is_none() {
            return Err(SessionError::NotInSession);
        }
        if self.role != Some(PlayerRole::Host) {
            return Err(SessionError::NotHost);
        }
        Ok(())
    }

    fn broadcast(&mut self, payload: MessagePayload) {
        let (session_id, sender) = match (&self.session, &self.local_player) {
            (Some(session), Some(player)) => (session.id.clone(), player.clone()),
            _ => return,
        };
        let message = RelayMessage::new(session_id, sender, payload);
        if let Err(err) = self.transport.publish(&message) {
            warn!(%err, "relay publish failed");
            self.bus.emit(&SessionEvent::ConnectionError {
                message: err.to_string(),
            });
        }
    }

    fn dispatch(&mut self, message: RelayMessage) {
        // Stale-session filter: one central check before any handler runs.
        let Some(current) = self.session.as_ref().map(|s| s.id.clone()) else {
            return;
        };
        if message.session_id != current {
            debug!(session = %message.session_id, "dropping message for another session");
            return;
        }

        let RelayMessage {
            sender, payload, ..
        } = message;

        match payload {
            MessagePayload::PlayerJoin { player } => self.on_player_join(player),
            MessagePayload::SessionSync { target, session } => {
                self.on_session_sync(target, session)
            }
            MessagePayload::GameMove { game_id, mv } => {
                self.bus.emit(&SessionEvent::GameMoveReceived {
                    sender,
                    game_id,
                    mv,
                });
            }
            MessagePayload::GameState { state } => {
                self.bus
                    .emit(&SessionEvent::GameStateUpdated { sender, state });
            }
            MessagePayload::PlayerReady { ready } => {
                if let Some(session) = self.session.as_mut() {
                    if let Some(player) = session.player_mut(&sender) {
                        player.ready = ready;
                    }
                }
                self.bus.emit(&SessionEvent::PlayerReadyChanged {
                    player_id: sender,
                    ready,
                });
            }
            MessagePayload::GameSelect { game_id } => {
                if let Some(session) = self.session.as_mut() {
                    session.game_id = Some(game_id.clone());
                }
                self.bus.emit(&SessionEvent::GameSelected { game_id });
            }
            MessagePayload::GameStart { game_id } => {
                if let Some(session) = self.session.as_mut() {
                    session.game_id = Some(game_id.clone());
                    session.state = SessionState::Playing;
                }
                self.bus.emit(&SessionEvent::GameStarted { game_id });
            }
        }
    }

    fn on_player_join(&mut self, joiner: Player) {
        let transport = self.transport.kind();
        let is_host = self.role == Some(PlayerRole::Host);

        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Already known (typically our own join echo): refresh the mutable
        // fields but keep the connection state we track ourselves.
        if let Some(known) = session.player_mut(&joiner.id) {
            known.name = joiner.name;
            known.ready = joiner.ready;
            return;
        }

        let mut player = joiner;
        player.connection = ConnectionState::Connected;
        player.transport = transport;

        if let Err(err) = session.add_player(player.clone()) {
            warn!(%err, player = %player.id, "dropping join");
            return;
        }

        self.bus.emit(&SessionEvent::PlayerConnected {
            player: player.clone(),
        });

        // The host answers every new joiner with the authoritative snapshot.
        if is_host {
            if let Some(snapshot) = self.session.clone() {
                self.broadcast(MessagePayload::SessionSync {
                    target: player.id,
                    session: snapshot,
                });
            }
        }
    }

    fn on_session_sync(&mut self, target: PlayerId, incoming: Session) {
        let Some(local_id) = self.local_player.clone() else {
            return;
        };
        if target != local_id {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        // Adopt the host's snapshot, but keep our own roster entry: the sync
        // round-trip itself proves the link, and the host's copy of us may
        // still carry the stale pre-join connection state.
        let mut own = session.player(&local_id).cloned();
        if let Some(own) = own.as_mut() {
            own.connection = ConnectionState::Connected;
        }

        let mut merged = incoming;
        if let Some(own) = own {
            if let Some(index) = merged.players.iter().position(|p| p.id == local_id) {
                merged.players[index] = own;
            } else if let Err(err) = merged.add_player(own) {
                warn!(%err, "host snapshot has no room for the local player");
            }
        }

        debug!(session = %merged.id, players = merged.player_count(), "reconciled from host sync");
        *session = merged;
    }
}
