//! Relay messages exchanged between session participants.
//!
//! Messages exist only in transit: they are broadcast on the shared relay
//! channel, dispatched by kind on receipt, and never persisted. A receiver
//! silently discards any message whose `session_id` is not its current
//! session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{now_millis, GameId, PlayerId, SessionId};
use crate::session::{Player, Session};

/// Envelope for everything that crosses the relay channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub session_id: SessionId,
    /// The player whose client published the message.
    pub sender: PlayerId,
    /// Milliseconds since the Unix epoch, stamped at publish time.
    pub timestamp: u64,
    pub payload: MessagePayload,
}

impl RelayMessage {
    /// Build an envelope stamped with the current wall-clock time.
    pub fn new(session_id: SessionId, sender: PlayerId, payload: MessagePayload) -> Self {
        Self {
            session_id,
            sender,
            timestamp: now_millis(),
            payload,
        }
    }
}

/// The closed set of wire message kinds.
///
/// Game moves and full game states are opaque to the session layer; they are
/// carried as raw JSON values and interpreted by each game's own reducer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MessagePayload {
    /// A guest announces itself to the session it wants to join.
    PlayerJoin { player: Player },
    /// The host's authoritative snapshot, addressed to one joining player.
    SessionSync { target: PlayerId, session: Session },
    /// A single in-game action, relayed verbatim.
    GameMove {
        game_id: Option<GameId>,
        #[serde(rename = "move")]
        mv: Value,
    },
    /// A full game state broadcast. Only the host is authoritative for these.
    GameState { state: Value },
    /// The sender's ready flag changed.
    PlayerReady { ready: bool },
    /// The host picked a game for the session.
    GameSelect { game_id: GameId },
    /// The host started the selected game.
    GameStart { game_id: GameId },
}
