//! Chat backend API: wire types, HTTP client, and the [`ChatBackend`] seam.
//!
//! The backend owns inference and persistence; this crate only talks to it over HTTP.

mod client;
mod types;

use async_trait::async_trait;

pub use client::{
    ApiClient, ApiError, DEFAULT_BASE_URL, DEFAULT_CHAT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
pub use types::{
    Analysis, ChatReply, ChatRequest, EraseReceipt, ExportBundle, ExportedMessage,
    ExportedSession, HistoryEntry, MessageRecord, Mode, Session,
};

/// One operation per backend capability. [`ApiClient`] is the HTTP implementation.
///
/// Listing operations (`list_modes`, `list_sessions`, `list_session_messages`, `chat_history`)
/// are expected to substitute default data when the backend is unreachable rather than fail
/// with [`ApiError::BackendUnavailable`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn health_check(&self) -> bool;
    async fn list_modes(&self) -> Result<Vec<Mode>, ApiError>;
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError>;
    async fn create_session(
        &self,
        name: &str,
        mode: &str,
        is_special: bool,
    ) -> Result<Session, ApiError>;
    async fn create_quick_session(&self) -> Result<Session, ApiError>;
    async fn rename_session(&self, id: &str, name: &str) -> Result<Session, ApiError>;
    async fn delete_session(&self, id: &str) -> Result<(), ApiError>;
    async fn list_session_messages(&self, id: &str) -> Result<Vec<MessageRecord>, ApiError>;
    async fn export_session(&self, id: &str) -> Result<ExportBundle, ApiError>;
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;
    async fn analyze_request(&self, description: &str) -> Result<Analysis, ApiError>;
    async fn erase_all_data(&self) -> Result<EraseReceipt, ApiError>;
    async fn chat_history(&self) -> Result<Vec<HistoryEntry>, ApiError>;
}
