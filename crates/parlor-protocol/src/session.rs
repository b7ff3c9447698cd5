//! Session and player records shared by every participant.

use serde::{Deserialize, Serialize};

use crate::ids::{GameId, PlayerId, SessionId};

/// Session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Gathering players, game not started.
    Waiting,
    /// A game is in progress.
    Playing,
    /// The game finished; the session lingers until everyone leaves.
    Ended,
}

/// Role of a participant within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerRole {
    Host,
    Guest,
}

/// Link state of a participant as observed locally.
///
/// `Reconnecting` and `Failed` are reserved for transports that can observe
/// link loss; no transition produces them today.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

/// Which relay variant carries a player's messages.
///
/// `Peer` is reserved for a real peer-to-peer data channel transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    CrossTab,
    Peer,
}

/// One participant in a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub role: PlayerRole,
    pub connection: ConnectionState,
    pub ready: bool,
    /// Milliseconds since the Unix epoch.
    pub joined_at: u64,
    pub transport: TransportKind,
}

/// The unit of coordination: one group of players attempting one game.
///
/// `host_id` is `None` only in a guest's provisional session, before the
/// host's sync response fills in the authoritative roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub game_id: Option<GameId>,
    pub host_id: Option<PlayerId>,
    /// Insertion order is join order.
    pub players: Vec<Player>,
    pub max_players: u8,
    pub state: SessionState,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Session {
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    /// The host's roster entry, if the host is known and present.
    pub fn host(&self) -> Option<&Player> {
        self.host_id.as_ref().and_then(|id| self.player(id))
    }

    /// Append a player, enforcing roster capacity and id uniqueness.
    pub fn add_player(&mut self, player: Player) -> Result<(), RosterError> {
        if self.is_full() {
            return Err(RosterError::Full {
                max: self.max_players,
            });
        }
        if self.contains(&player.id) {
            return Err(RosterError::Duplicate { id: player.id });
        }
        self.players.push(player);
        Ok(())
    }

    /// Remove a player, returning their record if they were present.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| &p.id == id)?;
        Some(self.players.remove(index))
    }
}

/// Roster mutation failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("session roster is full ({max} players)")]
    Full { max: u8 },
    #[error("player {id} is already in the roster")]
    Duplicate { id: PlayerId },
}
