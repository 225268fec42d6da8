//! Wire types for the chat backend's HTTP API.

use serde::{Deserialize, Serialize};

/// A persisted conversation thread as reported by `GET /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub mode: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default)]
    pub message_count: u64,
}

/// One stored exchange: a user utterance and the assistant's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub mode: String,
    pub timestamp: String,
}

/// Entry of the legacy `GET /history` listing (newest first, across sessions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub session_id: String,
    pub user_message: String,
    pub ai_response: String,
    pub mode: String,
    pub timestamp: String,
    #[serde(default)]
    pub session_name: Option<String>,
}

/// Backend behavior profile (e.g. coding assistant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Mode {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub mode: String,
    pub save_history: bool,
}

/// Reply of `POST /chat`. `session_id` and `message_id` are null when nothing was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub mode: String,
}

/// Reply of `POST /analyze-request`: suggested mode and name for a special session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Analysis {
    pub suggested_mode: String,
    pub suggested_name: String,
    pub mode_info: Mode,
}

/// Session metadata inside an export bundle. The backend omits the message count here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSession {
    pub id: String,
    pub name: String,
    pub mode: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub is_special: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
}

/// Message inside an export bundle. The backend omits the owning session id here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub user_message: String,
    pub ai_response: String,
    pub mode: String,
    pub timestamp: String,
}

/// Reply of `GET /sessions/{id}/export`, written out verbatim as the export artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub session: ExportedSession,
    pub messages: Vec<ExportedMessage>,
    pub exported_at: String,
}

/// Reply of `POST /erase`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EraseReceipt {
    pub new_session_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub name: &'a str,
    pub mode: &'a str,
    pub is_special: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RenameSessionRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub description: &'a str,
}

/// Structured error body (`{"error": "..."}`); every field optional so odd bodies still parse.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
