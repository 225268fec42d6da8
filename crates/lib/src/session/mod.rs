//! Session store: the session list, the active session and its message buffer, kept consistent
//! with a backend that may be unreachable.
//!
//! [`AppState`] holds the state and its transitions; [`SessionController`] runs the operations
//! that call the backend.

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{most_recent, AppState, Notice, NoticeLevel, SettleOutcome};

use crate::api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Session name cannot be empty")]
    EmptyName,
    #[error("Description cannot be empty")]
    EmptyDescription,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("A message is already being sent")]
    SendInFlight,
    #[error("Backend is offline; reconnect before sending")]
    Offline,
    #[error("Unknown session: {0}")]
    UnknownSession(String),
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    #[error("Failed to export session: {0}")]
    Export(String),
}
