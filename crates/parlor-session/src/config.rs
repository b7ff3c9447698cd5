//! Coordinator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::SessionCoordinator`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Origin and path prepended to join deep-links
    /// (`{join_link_base}#/multiplayer/join/{session_id}`).
    pub join_link_base: String,
    /// Roster capacity used when the caller does not pick one, and for a
    /// guest's provisional session until the host's sync arrives.
    pub default_max_players: u8,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            join_link_base: "http://localhost:8080/".to_string(),
            default_max_players: 4,
        }
    }
}
