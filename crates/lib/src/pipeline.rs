//! Message pipeline: turns stored message records into display entries and tracks the
//! optimistic send flow.
//!
//! Each stored record expands to a user entry followed by an assistant entry. A send appends an
//! optimistic user entry first, then either the reply or an error entry once the backend answers.

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, MessageRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Where a display entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Half of a backend message record.
    Stored,
    /// User text shown before the backend has answered.
    Optimistic,
    /// Assistant text returned by a send.
    Reply,
    /// Assistant-role placeholder describing a failed send.
    Error,
}

/// One rendered line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: String,
    pub origin: Origin,
}

impl DisplayEntry {
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Expand records into display entries: two per record (user, then assistant), record order kept.
pub fn expand_records(records: &[MessageRecord]) -> Vec<DisplayEntry> {
    records
        .iter()
        .flat_map(|r| {
            [
                DisplayEntry {
                    id: format!("user-{}", r.id),
                    role: Role::User,
                    text: r.user_message.clone(),
                    timestamp: r.timestamp.clone(),
                    origin: Origin::Stored,
                },
                DisplayEntry {
                    id: format!("ai-{}", r.id),
                    role: Role::Assistant,
                    text: r.ai_response.clone(),
                    timestamp: r.timestamp.clone(),
                    origin: Origin::Stored,
                },
            ]
        })
        .collect()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn local_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// User entry appended as soon as a send starts. Its id never collides with a stored id.
pub fn optimistic_user_entry(text: &str) -> DisplayEntry {
    DisplayEntry {
        id: local_id("local-user"),
        role: Role::User,
        text: text.to_string(),
        timestamp: now(),
        origin: Origin::Optimistic,
    }
}

pub fn reply_entry(text: &str) -> DisplayEntry {
    DisplayEntry {
        id: local_id("local-ai"),
        role: Role::Assistant,
        text: text.to_string(),
        timestamp: now(),
        origin: Origin::Reply,
    }
}

/// Inline assistant entry describing why a send failed.
pub fn error_entry(err: &ApiError) -> DisplayEntry {
    DisplayEntry {
        id: local_id("error"),
        role: Role::Assistant,
        text: format!("Sorry, I encountered an error: {}", err),
        timestamp: now(),
        origin: Origin::Error,
    }
}

/// Tag for an in-flight send: the session it targets and the activation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTicket {
    pub session_id: Option<String>,
    pub activation: u64,
    pub mode: String,
}

/// Tag for an in-flight message load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTicket {
    pub session_id: String,
    pub activation: u64,
}

/// Per-send state machine: `Idle -> Pending -> (Settled | Failed)`, then back to `Pending` on the
/// next send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SendState {
    #[default]
    Idle,
    Pending { ticket: SendTicket },
    Settled,
    Failed { message: String },
}

impl SendState {
    pub fn is_pending(&self) -> bool {
        matches!(self, SendState::Pending { .. })
    }

    /// True when `ticket` is the send currently pending.
    pub fn holds(&self, ticket: &SendTicket) -> bool {
        matches!(self, SendState::Pending { ticket: t } if t == ticket)
    }
}
