//! Session state module
//!
//! Coarse lifecycle of a peer session as seen by the application.

/// Represents the state of a peer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Provider bound, waiting for the signaling service to open
    Connecting,
    /// Signaling service opened the session
    Ready,
}

impl SessionState {
    /// Derive the state from the readiness flag
    pub fn from_ready(ready: bool) -> Self {
        if ready {
            SessionState::Ready
        } else {
            SessionState::Connecting
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Connecting
    }
}
