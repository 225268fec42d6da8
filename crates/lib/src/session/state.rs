//! Explicit application state and its transitions.
//!
//! Nothing here talks to the network. The controller performs calls and feeds results back in
//! through the named transitions below; every in-flight call carries a ticket so results for a
//! session that is no longer active are dropped.

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ChatReply, MessageRecord, Mode, Session};
use crate::modes::ModeRegistry;
use crate::pipeline::{self, DisplayEntry, LoadTicket, SendState, SendTicket};
use crate::session::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Transient user-facing notification; the front end drains these after each operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// What happened to a send result when it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Reply appended. `adopted_session` is set when a brand-new conversation got its id.
    Applied { adopted_session: Option<String> },
    /// The active session changed while the send was in flight; reply dropped from the buffer.
    /// `created_session` is set when the backend opened a session for a conversation that had
    /// none, so the caller can still pick it up in the session list.
    Stale { created_session: Option<String> },
}

/// Parse backend timestamps onto one UTC scale: RFC 3339 values are converted to UTC and naive
/// ISO 8601 values (as the backend writes them) are taken to be UTC already.
fn parse_timestamp(s: &str) -> Option<chrono::NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.naive_utc())
        .ok()
        .or_else(|| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
}

/// Most recently updated session; first in list order among ties, unparseable timestamps last.
pub fn most_recent(sessions: &[Session]) -> Option<&Session> {
    let mut best: Option<(&Session, Option<chrono::NaiveDateTime>)> = None;
    for s in sessions {
        let key = parse_timestamp(&s.updated_at);
        match best {
            Some((_, best_key)) if key <= best_key => {}
            _ => best = Some((s, key)),
        }
    }
    best.map(|(s, _)| s)
}

/// Client-visible state: sessions, active session, its messages, connectivity and pending send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    sessions: Vec<Session>,
    active_session_id: Option<String>,
    current_mode: String,
    modes: ModeRegistry,
    messages: Vec<DisplayEntry>,
    connected: bool,
    save_history: bool,
    send: SendState,
    /// Bumped on every change of the active conversation; tickets from older values are stale.
    activation: u64,
    last_error: Option<String>,
    notices: Vec<Notice>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(crate::modes::DEFAULT_MODE_ID, true)
    }
}

impl AppState {
    pub fn new(default_mode: &str, save_history: bool) -> Self {
        Self {
            sessions: Vec::new(),
            active_session_id: None,
            current_mode: default_mode.to_string(),
            modes: ModeRegistry::default(),
            messages: Vec::new(),
            connected: false,
            save_history,
            send: SendState::Idle,
            activation: 0,
            last_error: None,
            notices: Vec::new(),
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        let id = self.active_session_id.as_deref()?;
        self.find(id)
    }

    pub fn find(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn current_mode(&self) -> &str {
        &self.current_mode
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    pub fn messages(&self) -> &[DisplayEntry] {
        &self.messages
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn save_history(&self) -> bool {
        self.save_history
    }

    pub fn send_state(&self) -> &SendState {
        &self.send
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn notify_success(&mut self, text: impl Into<String>) {
        self.notices.push(Notice {
            level: NoticeLevel::Success,
            text: text.into(),
        });
    }

    pub fn record_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.last_error = Some(text.clone());
        self.notices.push(Notice {
            level: NoticeLevel::Error,
            text,
        });
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn set_connected(&mut self, connected: bool) {
        if self.connected != connected {
            log::info!("backend {}", if connected { "connected" } else { "disconnected" });
        }
        self.connected = connected;
    }

    pub fn set_modes(&mut self, modes: Vec<Mode>) {
        self.modes = ModeRegistry::new(modes);
    }

    pub fn set_save_history(&mut self, enabled: bool) {
        self.save_history = enabled;
        self.last_error = None;
    }

    /// Change the mode used for the next send. Past messages keep their recorded mode.
    pub fn set_mode(&mut self, mode: &str) -> Result<(), StoreError> {
        if !self.modes.contains(mode) {
            return Err(StoreError::UnknownMode(mode.to_string()));
        }
        self.current_mode = mode.to_string();
        Ok(())
    }

    /// Replace the session list wholesale with a fresh backend listing.
    pub fn replace_sessions(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
    }

    fn activate(&mut self, session_id: Option<String>) -> Option<LoadTicket> {
        self.activation += 1;
        self.messages.clear();
        if let Some(mode) = session_id
            .as_deref()
            .and_then(|id| self.find(id))
            .map(|s| s.mode.clone())
        {
            self.current_mode = mode;
        }
        self.active_session_id = session_id.clone();
        session_id.map(|session_id| LoadTicket {
            session_id,
            activation: self.activation,
        })
    }

    /// Make `id` active and adopt its mode; the buffer is emptied until the returned load lands.
    pub fn select(&mut self, id: &str) -> Result<LoadTicket, StoreError> {
        if self.find(id).is_none() {
            return Err(StoreError::UnknownSession(id.to_string()));
        }
        self.activate(Some(id.to_string()))
            .ok_or_else(|| StoreError::UnknownSession(id.to_string()))
    }

    /// Activate the most recently updated session, if any.
    pub fn select_most_recent(&mut self) -> Option<LoadTicket> {
        let id = most_recent(&self.sessions)?.id.clone();
        self.activate(Some(id))
    }

    /// Apply a message load. Returns false (and changes nothing) when the ticket is stale.
    pub fn apply_messages(&mut self, ticket: &LoadTicket, records: &[MessageRecord]) -> bool {
        if ticket.activation != self.activation
            || self.active_session_id.as_deref() != Some(ticket.session_id.as_str())
        {
            log::debug!(
                "dropping messages for session {} (no longer active)",
                ticket.session_id
            );
            return false;
        }
        self.messages = pipeline::expand_records(records);
        true
    }

    /// Prepend a freshly created session and make it active with an empty buffer.
    pub fn adopt_new_session(&mut self, session: Session) {
        let id = session.id.clone();
        self.sessions.retain(|s| s.id != id);
        self.sessions.insert(0, session);
        self.activate(Some(id));
    }

    /// Replace the local copy of a renamed session.
    pub fn apply_rename(&mut self, id: &str, renamed: Session) {
        if let Some(s) = self.sessions.iter_mut().find(|s| s.id == id) {
            *s = renamed;
        }
    }

    /// Remove a deleted session. When it was active, the first remaining session becomes active
    /// (returned ticket loads its messages); with none left the buffer is cleared.
    pub fn remove_session(&mut self, id: &str) -> Option<LoadTicket> {
        self.sessions.retain(|s| s.id != id);
        if self.active_session_id.as_deref() != Some(id) {
            return None;
        }
        let next = self.sessions.first().map(|s| s.id.clone());
        self.activate(next)
    }

    /// Drop all local data after an erase; the backend's replacement session becomes active.
    pub fn reset_after_erase(&mut self, new_session_id: String) -> Option<LoadTicket> {
        self.sessions.clear();
        self.last_error = None;
        self.activate(Some(new_session_id))
    }

    /// Adopt the active session's recorded mode (used after a refresh brings it into the list).
    pub fn sync_mode_with_active(&mut self) {
        if let Some(mode) = self.active_session().map(|s| s.mode.clone()) {
            self.current_mode = mode;
        }
    }

    /// Start a send: append the optimistic user entry and move to `Pending`.
    pub fn begin_send(&mut self, text: &str) -> Result<SendTicket, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        if self.send.is_pending() {
            return Err(StoreError::SendInFlight);
        }
        if !self.connected {
            return Err(StoreError::Offline);
        }
        let ticket = SendTicket {
            session_id: self.active_session_id.clone(),
            activation: self.activation,
            mode: self.current_mode.clone(),
        };
        self.messages.push(pipeline::optimistic_user_entry(text));
        self.send = SendState::Pending {
            ticket: ticket.clone(),
        };
        self.last_error = None;
        Ok(ticket)
    }

    fn release(&mut self, ticket: &SendTicket, next: SendState) {
        if self.send.holds(ticket) {
            self.send = next;
        }
    }

    /// Apply a successful send.
    pub fn settle_send(&mut self, ticket: &SendTicket, reply: &ChatReply) -> SettleOutcome {
        self.release(ticket, SendState::Settled);
        self.set_connected(true);
        let created = match (&ticket.session_id, &reply.session_id) {
            (None, Some(id)) => Some(id.clone()),
            _ => None,
        };
        if ticket.activation != self.activation {
            log::debug!("dropping reply for a conversation that is no longer active");
            return SettleOutcome::Stale {
                created_session: created,
            };
        }
        self.messages.push(pipeline::reply_entry(&reply.response));
        if let Some(id) = &created {
            self.active_session_id = Some(id.clone());
        }
        SettleOutcome::Applied {
            adopted_session: created,
        }
    }

    /// Apply a failed send: one inline assistant-role error entry (if still current), an error
    /// notice, and a disconnect when the backend was unreachable.
    pub fn fail_send(&mut self, ticket: &SendTicket, err: &ApiError) {
        self.release(
            ticket,
            SendState::Failed {
                message: err.to_string(),
            },
        );
        if err.is_unavailable() {
            self.set_connected(false);
        }
        if ticket.activation == self.activation {
            self.messages.push(pipeline::error_entry(err));
        }
        self.record_error(err.to_string());
    }
}
