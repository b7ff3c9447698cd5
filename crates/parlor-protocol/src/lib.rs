//! Parlor multiplayer protocol.
//!
//! Shared data model and wire format for the mini-games session layer:
//! identifier newtypes, session/player records, the relay message envelope,
//! and the codec used on the broadcast channel.

pub mod ids;
pub mod message;
pub mod session;
pub mod wire;

pub use ids::{now_millis, GameId, PlayerId, SessionId};
pub use message::{MessagePayload, RelayMessage};
pub use session::{
    ConnectionState, Player, PlayerRole, RosterError, Session, SessionState, TransportKind,
};
pub use wire::{
    decode_message, decode_message_compact, encode_message, encode_message_compact, WireError,
};
