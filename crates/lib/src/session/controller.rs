//! Session operations: call the backend, then apply the result to [`AppState`].
//!
//! Failures are recorded as error notices and returned; nothing is retried.

use std::path::{Path, PathBuf};

use crate::api::{Analysis, ChatBackend, ChatRequest, HistoryEntry, Session};
use crate::export;
use crate::pipeline::LoadTicket;
use crate::session::state::{AppState, Notice, SettleOutcome};
use crate::session::StoreError;

/// Owns the backend handle and the application state; one operation runs at a time.
pub struct SessionController<B: ChatBackend> {
    backend: B,
    state: AppState,
    export_dir: PathBuf,
}

impl<B: ChatBackend> SessionController<B> {
    pub fn new(backend: B, state: AppState, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            state,
            export_dir: export_dir.into(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    pub fn set_export_dir(&mut self, dir: impl Into<PathBuf>) {
        self.export_dir = dir.into();
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.state.take_notices()
    }

    fn fail<T>(&mut self, err: impl Into<StoreError>) -> Result<T, StoreError> {
        let err = err.into();
        log::debug!("operation failed: {:?}", err);
        self.state.record_error(err.to_string());
        Err(err)
    }

    /// Probe the backend, load the mode catalog and, when reachable, the sessions; the most
    /// recently updated session becomes active. A failed message load for that session only
    /// records an error notice.
    pub async fn initialize(&mut self) -> Result<(), StoreError> {
        let connected = self.backend.health_check().await;
        self.state.set_connected(connected);

        let modes = match self.backend.list_modes().await {
            Ok(m) => m,
            Err(e) => return self.fail(e),
        };
        self.state.set_modes(modes);

        if !connected {
            log::warn!("backend unreachable at startup, continuing offline");
            return Ok(());
        }

        self.refresh_sessions().await?;
        if let Some(ticket) = self.state.select_most_recent() {
            if let Err(e) = self.load_messages(ticket).await {
                log::warn!("loading messages for the most recent session: {}", e);
            }
        }
        Ok(())
    }

    async fn load_messages(&mut self, ticket: LoadTicket) -> Result<(), StoreError> {
        match self.backend.list_session_messages(&ticket.session_id).await {
            Ok(records) => {
                if self.state.apply_messages(&ticket, &records) {
                    log::debug!(
                        "loaded {} messages for session {}",
                        records.len(),
                        ticket.session_id
                    );
                }
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Re-fetch the session list and replace the local copy.
    pub async fn refresh_sessions(&mut self) -> Result<(), StoreError> {
        match self.backend.list_sessions().await {
            Ok(sessions) => {
                self.state.replace_sessions(sessions);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Switch to another session, adopt its mode and reload its messages.
    pub async fn select_session(&mut self, id: &str) -> Result<(), StoreError> {
        let ticket = match self.state.select(id) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        self.load_messages(ticket).await
    }

    pub async fn create_quick_session(&mut self) -> Result<Session, StoreError> {
        match self.backend.create_quick_session().await {
            Ok(session) => {
                self.state.set_connected(true);
                self.state
                    .notify_success(format!("Created new chat: {}", session.name));
                self.state.adopt_new_session(session.clone());
                Ok(session)
            }
            Err(e) => self.fail(e),
        }
    }

    /// First phase of special-session creation: ask the backend for a mode and a name.
    pub async fn analyze_request(&mut self, description: &str) -> Result<Analysis, StoreError> {
        if description.trim().is_empty() {
            return self.fail(StoreError::EmptyDescription);
        }
        match self.backend.analyze_request(description).await {
            Ok(analysis) => {
                self.state.set_connected(true);
                Ok(analysis)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Second phase: create the session with the (possibly edited) name and mode. The
    /// description is not stored anywhere.
    pub async fn create_special_session(
        &mut self,
        name: &str,
        mode: &str,
        description: &str,
    ) -> Result<Session, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return self.fail(StoreError::EmptyName);
        }
        if !self.state.modes().contains(mode) {
            return self.fail(StoreError::UnknownMode(mode.to_string()));
        }
        log::debug!(
            "creating special session {:?} in mode {} ({} character description)",
            name,
            mode,
            description.chars().count()
        );
        match self.backend.create_session(name, mode, true).await {
            Ok(session) => {
                self.state.set_connected(true);
                self.state
                    .notify_success(format!("Created special session: {}", session.name));
                self.state.adopt_new_session(session.clone());
                Ok(session)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Rename on the backend first; the local name only changes once the backend agrees.
    pub async fn rename_session(&mut self, id: &str, name: &str) -> Result<(), StoreError> {
        let Some(current) = self.state.find(id).map(|s| s.name.clone()) else {
            return self.fail(StoreError::UnknownSession(id.to_string()));
        };
        let name = name.trim();
        if name.is_empty() {
            return self.fail(StoreError::EmptyName);
        }
        if name == current {
            return Ok(());
        }
        match self.backend.rename_session(id, name).await {
            Ok(renamed) => {
                self.state.set_connected(true);
                self.state.apply_rename(id, renamed);
                self.state
                    .notify_success(format!("Renamed session to {}", name));
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Delete a session. If it was active, the first remaining one takes over.
    pub async fn delete_session(&mut self, id: &str) -> Result<(), StoreError> {
        if let Err(e) = self.backend.delete_session(id).await {
            return self.fail(e);
        }
        self.state.set_connected(true);
        let next = self.state.remove_session(id);
        self.state.notify_success("Session deleted successfully");
        if let Some(ticket) = next {
            self.load_messages(ticket).await?;
        }
        Ok(())
    }

    /// Fetch the export bundle and write it to the export directory. Returns the file path.
    pub async fn export_session(&mut self, id: &str) -> Result<PathBuf, StoreError> {
        let bundle = match self.backend.export_session(id).await {
            Ok(b) => b,
            Err(e) => return self.fail(e),
        };
        self.state.set_connected(true);
        let date = chrono::Utc::now().date_naive();
        match export::write_export(&self.export_dir, &bundle, date).await {
            Ok(path) => {
                self.state
                    .notify_success(format!("Session exported to {}", path.display()));
                Ok(path)
            }
            Err(e) => self.fail(StoreError::Export(format!("{:#}", e))),
        }
    }

    /// Erase everything on the backend, reset local state, then pick up the replacement session.
    pub async fn erase_all_data(&mut self) -> Result<(), StoreError> {
        let receipt = match self.backend.erase_all_data().await {
            Ok(r) => r,
            Err(e) => return self.fail(e),
        };
        self.state.set_connected(true);
        log::info!("erased all data, replacement session {}", receipt.new_session_id);
        let ticket = self.state.reset_after_erase(receipt.new_session_id);
        self.refresh_sessions().await?;
        self.state.sync_mode_with_active();
        self.state
            .notify_success("All chat data has been successfully erased");
        if let Some(ticket) = ticket {
            self.load_messages(ticket).await?;
        }
        Ok(())
    }

    /// Send a message in the active conversation (or start a new one when none is active).
    pub async fn send_message(&mut self, text: &str) -> Result<(), StoreError> {
        let ticket = match self.state.begin_send(text) {
            Ok(t) => t,
            Err(e) => return self.fail(e),
        };
        let request = ChatRequest {
            message: text.trim().to_string(),
            session_id: ticket.session_id.clone(),
            mode: ticket.mode.clone(),
            save_history: self.state.save_history(),
        };
        match self.backend.send_message(&request).await {
            Ok(reply) => {
                let created = match self.state.settle_send(&ticket, &reply) {
                    SettleOutcome::Applied { adopted_session } => adopted_session,
                    SettleOutcome::Stale { created_session } => created_session,
                };
                if let Some(id) = created {
                    log::info!("new conversation saved as session {}", id);
                    if let Err(e) = self.refresh_sessions().await {
                        log::warn!("refreshing sessions after first message: {}", e);
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.state.fail_send(&ticket, &e);
                Err(e.into())
            }
        }
    }

    pub fn set_mode(&mut self, mode: &str) -> Result<(), StoreError> {
        if let Err(e) = self.state.set_mode(mode) {
            return self.fail(e);
        }
        Ok(())
    }

    pub fn set_save_history(&mut self, enabled: bool) {
        self.state.set_save_history(enabled);
    }

    /// Re-probe the backend. Coming back online reloads modes and sessions.
    pub async fn check_connection(&mut self) -> Result<bool, StoreError> {
        let was_connected = self.state.is_connected();
        let up = self.backend.health_check().await;
        self.state.set_connected(up);
        if up && !was_connected {
            match self.backend.list_modes().await {
                Ok(modes) => self.state.set_modes(modes),
                Err(e) => return self.fail(e),
            }
            self.refresh_sessions().await?;
            if self.state.active_session_id().is_none() {
                if let Some(ticket) = self.state.select_most_recent() {
                    self.load_messages(ticket).await?;
                }
            }
        }
        Ok(up)
    }

    /// Legacy cross-session history listing.
    pub async fn chat_history(&mut self) -> Result<Vec<HistoryEntry>, StoreError> {
        match self.backend.chat_history().await {
            Ok(h) => Ok(h),
            Err(e) => self.fail(e),
        }
    }
}
