//! Relay transport abstraction and the cross-tab stand-in.
//!
//! The coordinator is written against [`RelayTransport`] only, so a genuine
//! peer transport (real data channels with a signaling exchange) can be
//! substituted without changing its public contract. The shipped
//! implementation, [`CrossTabHub`], models a same-origin broadcast channel:
//! every attached endpoint observes every published message (including the
//! publisher's own echo) after a short visibility delay that stands in for
//! relay latency. It is not a network transport; cross-device play needs a
//! transport this crate does not ship.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use parlor_protocol::{decode_message, encode_message, RelayMessage, TransportKind, WireError};

/// How long a published message stays invisible to every endpoint.
pub const DEFAULT_RELAY_DELAY: Duration = Duration::from_millis(25);

/// Failures surfaced by a relay transport on the publish path.
///
/// The relay is fire-and-forget: delivery is never acknowledged, and a
/// receiver that is gone simply never observes the message.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay channel closed")]
    Closed,
    #[error(transparent)]
    Encode(#[from] WireError),
}

/// Bidirectional broadcast substrate the coordinator relays through.
pub trait RelayTransport {
    /// Broadcast a message to every participant on the channel.
    fn publish(&mut self, message: &RelayMessage) -> Result<(), RelayError>;

    /// Move every message that has become visible into `out`, oldest first.
    fn drain(&mut self, out: &mut Vec<RelayMessage>);

    /// Drop any queued inbound messages tied to the previous session.
    fn release(&mut self);

    /// Tag recorded on roster entries added through this transport.
    fn kind(&self) -> TransportKind;
}

struct QueuedText {
    visible_at: Instant,
    text: String,
}

#[derive(Default)]
struct HubState {
    /// One inbox per attached endpoint; `None` marks a detached slot.
    inboxes: Vec<Option<VecDeque<QueuedText>>>,
}

/// Same-origin broadcast stand-in shared by every endpoint of one "origin".
#[derive(Clone)]
pub struct CrossTabHub {
    state: Arc<Mutex<HubState>>,
    delay: Duration,
}

impl CrossTabHub {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_RELAY_DELAY)
    }

    /// A hub whose messages become visible after `delay`. Tests usually use
    /// `Duration::ZERO`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            delay,
        }
    }

    /// Attach a new endpoint (one per tab/client).
    pub fn endpoint(&self) -> CrossTabEndpoint {
        let slot = match self.state.lock() {
            Ok(mut state) => {
                state.inboxes.push(Some(VecDeque::new()));
                state.inboxes.len() - 1
            }
            Err(_) => usize::MAX,
        };
        CrossTabEndpoint {
            state: Arc::clone(&self.state),
            slot,
            delay: self.delay,
        }
    }

    /// Put raw channel text in front of every endpoint, as a foreign writer
    /// on the shared channel would.
    pub fn publish_raw(&self, text: &str) {
        let visible_at = Instant::now() + self.delay;
        if let Ok(mut state) = self.state.lock() {
            for inbox in state.inboxes.iter_mut().flatten() {
                inbox.push_back(QueuedText {
                    visible_at,
                    text: text.to_string(),
                });
            }
        }
    }
}

impl Default for CrossTabHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's handle on a [`CrossTabHub`].
pub struct CrossTabEndpoint {
    state: Arc<Mutex<HubState>>,
    slot: usize,
    delay: Duration,
}

impl RelayTransport for CrossTabEndpoint {
    fn publish(&mut self, message: &RelayMessage) -> Result<(), RelayError> {
        let text = encode_message(message)?;
        let visible_at = Instant::now() + self.delay;
        let mut state = self.state.lock().map_err(|_| RelayError::Closed)?;
        for inbox in state.inboxes.iter_mut().flatten() {
            inbox.push_back(QueuedText {
                visible_at,
                text: text.clone(),
            });
        }
        Ok(())
    }

    fn drain(&mut self, out: &mut Vec<RelayMessage>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let Some(inbox) = state.inboxes.get_mut(self.slot).and_then(Option::as_mut) else {
            return;
        };

        let now = Instant::now();
        while inbox.front().is_some_and(|entry| entry.visible_at <= now) {
            let Some(entry) = inbox.pop_front() else {
                break;
            };
            match decode_message(&entry.text) {
                Ok(message) => out.push(message),
                Err(err) => warn!(%err, "dropping malformed relay message"),
            }
        }
    }

    fn release(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(Some(inbox)) = state.inboxes.get_mut(self.slot) {
                inbox.clear();
            }
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::CrossTab
    }
}

impl Drop for CrossTabEndpoint {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(slot) = state.inboxes.get_mut(self.slot) {
                *slot = None;
            }
        }
    }
}
