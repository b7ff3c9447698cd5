//! Wire codec for relay messages.
//!
//! Two formats, mirroring the two transport families: JSON text for the
//! cross-tab broadcast channel (which carries strings), and MessagePack for
//! binary peer transports.

use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::message::RelayMessage;

/// Codec failures. On the receive path these are logged and the input is
/// dropped; they are never surfaced to command callers.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode a message as the JSON text carried by the cross-tab channel.
pub fn encode_message(message: &RelayMessage) -> Result<String, WireError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a message from cross-tab channel text.
pub fn decode_message(text: &str) -> Result<RelayMessage, WireError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a message as MessagePack (named fields, self-describing).
pub fn encode_message_compact(message: &RelayMessage) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(message)?)
}

/// Decode a message from MessagePack bytes.
pub fn decode_message_compact(bytes: &[u8]) -> Result<RelayMessage, WireError> {
    Ok(decode::from_slice(bytes)?)
}
