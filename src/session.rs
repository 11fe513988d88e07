//! Lifecycle shared by upload and PDF sessions.

use serde::Serialize;

/// Where a request-backed session is in its life.
///
/// `Idle → InFlight → (Succeeded | Failed)`; starting again resets to
/// `InFlight` with the previous outcome discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}
