//! Parlor session coordination.
//!
//! One `SessionCoordinator` per running client owns the lifecycle of at most
//! one multiplayer session: creation (host role), joining (guest role),
//! roster and ready-state tracking, game selection/start signaling, and the
//! relay of moves and game state between peers. It is written against the
//! [`transport::RelayTransport`] abstraction; the shipped implementation is
//! a same-origin cross-tab broadcast stand-in, not a real network transport.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod transport;

pub use config::CoordinatorConfig;
pub use coordinator::SessionCoordinator;
pub use error::SessionError;
pub use events::{EventBus, EventKind, ListenerId, SessionEvent};
pub use transport::{
    CrossTabEndpoint, CrossTabHub, RelayError, RelayTransport, DEFAULT_RELAY_DELAY,
};
