//! Command error taxonomy.

use thiserror::Error;

/// Precondition failures for coordinator commands.
///
/// Always synchronous: a failed command leaves session state untouched.
/// Malformed relay input never reaches callers (dropped and logged), and
/// relay publish failures surface as `connection-error` events rather than
/// command errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyInSession,
    #[error("no active session")]
    NotInSession,
    #[error("only the host can perform this action")]
    NotHost,
}
