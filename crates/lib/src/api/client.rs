//! Chat backend HTTP client (http://localhost:5000 by default).
//!
//! Every call carries a timeout. Read-only listings degrade to empty or default data when the
//! backend cannot be reached; everything else reports a typed [`ApiError`].

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::api::types::{
    AnalyzeRequest, Analysis, ChatReply, ChatRequest, CreateSessionRequest, EraseReceipt,
    ErrorBody, ExportBundle, HistoryEntry, MessageRecord, Mode, RenameSessionRequest, Session,
};
use crate::api::ChatBackend;
use crate::config::BackendConfig;
use crate::modes;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure of a backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Connection refused, DNS failure or timeout. The payload is the transport detail.
    #[error("Backend server is not running. Please start the backend server first.")]
    BackendUnavailable(String),
    /// Non-2xx reply; `message` is the backend's `error` field or a generic substitute.
    #[error("{message}")]
    RequestRejected { status: u16, message: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApiError::BackendUnavailable(_))
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ApiError::BackendUnavailable(err.to_string())
        } else if err.is_decode() {
            ApiError::Unexpected(format!("malformed response: {}", err))
        } else {
            ApiError::Unexpected(err.to_string())
        }
    }

    fn rejected(status: u16, body: &str, fallback: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        ApiError::RequestRejected { status, message }
    }
}

/// Client for the chat backend HTTP API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    chat_timeout: Duration,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.url.clone()).with_timeouts(
            Duration::from_secs(config.chat_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Override timeouts: `chat` for inference-bound calls, `request` for metadata calls.
    pub fn with_timeouts(mut self, chat: Duration, request: Duration) -> Self {
        self.chat_timeout = chat;
        self.request_timeout = request;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ApiError::Unexpected(format!("invalid backend url {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Unexpected(format!("backend url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send the request and turn transport failures and non-2xx statuses into [`ApiError`].
    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Duration,
        fallback: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let res = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(ApiError::from_transport)?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            log::debug!("backend rejected request: {} {}", status, body);
            return Err(ApiError::rejected(status.as_u16(), &body, fallback));
        }
        Ok(res)
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Duration,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let res = self.execute(builder, timeout, fallback).await?;
        res.json::<T>().await.map_err(ApiError::from_transport)
    }
}

/// Replace `BackendUnavailable` with fallback data for read-only listings.
fn degrade<T>(
    result: Result<T, ApiError>,
    what: &str,
    fallback: impl FnOnce() -> T,
) -> Result<T, ApiError> {
    match result {
        Err(ApiError::BackendUnavailable(detail)) => {
            log::warn!("{}: backend unavailable ({}), using fallback", what, detail);
            Ok(fallback())
        }
        other => other,
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    /// GET /health: any 2xx means up; every failure means down.
    async fn health_check(&self) -> bool {
        let url = match self.url(&["health"]) {
            Ok(u) => u,
            Err(_) => return false,
        };
        match self
            .execute(self.client.get(url), self.request_timeout, "health check failed")
            .await
        {
            Ok(_) => true,
            Err(e) => {
                log::debug!("health check failed: {:?}", e);
                false
            }
        }
    }

    /// GET /modes: falls back to the built-in catalog when offline.
    async fn list_modes(&self) -> Result<Vec<Mode>, ApiError> {
        let url = self.url(&["modes"])?;
        let res = self
            .fetch_json(self.client.get(url), self.request_timeout, "Failed to fetch modes")
            .await;
        degrade(res, "list modes", modes::default_modes)
    }

    /// GET /sessions: empty when offline.
    async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        let url = self.url(&["sessions"])?;
        let res = self
            .fetch_json(self.client.get(url), self.request_timeout, "Failed to fetch sessions")
            .await;
        degrade(res, "list sessions", Vec::new)
    }

    /// POST /sessions: named session (special sessions pass `is_special = true`).
    async fn create_session(
        &self,
        name: &str,
        mode: &str,
        is_special: bool,
    ) -> Result<Session, ApiError> {
        let url = self.url(&["sessions"])?;
        let body = CreateSessionRequest {
            name: name.trim(),
            mode,
            is_special,
        };
        self.fetch_json(
            self.client.post(url).json(&body),
            self.request_timeout,
            "Failed to create session",
        )
        .await
    }

    /// POST /sessions/quick: server picks name and mode.
    async fn create_quick_session(&self) -> Result<Session, ApiError> {
        let url = self.url(&["sessions", "quick"])?;
        self.fetch_json(
            self.client.post(url),
            self.request_timeout,
            "Failed to create quick session",
        )
        .await
    }

    /// PUT /sessions/{id}: rename.
    async fn rename_session(&self, id: &str, name: &str) -> Result<Session, ApiError> {
        let url = self.url(&["sessions", id])?;
        let body = RenameSessionRequest { name: name.trim() };
        self.fetch_json(
            self.client.put(url).json(&body),
            self.request_timeout,
            "Failed to rename session",
        )
        .await
    }

    /// DELETE /sessions/{id}: response body ignored.
    async fn delete_session(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&["sessions", id])?;
        self.execute(
            self.client.delete(url),
            self.request_timeout,
            "Failed to delete session",
        )
        .await?;
        Ok(())
    }

    /// GET /sessions/{id}/messages: backend order; empty when offline.
    async fn list_session_messages(&self, id: &str) -> Result<Vec<MessageRecord>, ApiError> {
        let url = self.url(&["sessions", id, "messages"])?;
        let res = self
            .fetch_json(self.client.get(url), self.request_timeout, "Failed to fetch messages")
            .await;
        degrade(res, "list session messages", Vec::new)
    }

    /// GET /sessions/{id}/export
    async fn export_session(&self, id: &str) -> Result<ExportBundle, ApiError> {
        let url = self.url(&["sessions", id, "export"])?;
        self.fetch_json(
            self.client.get(url),
            self.request_timeout,
            "Failed to export session",
        )
        .await
    }

    /// POST /chat: may block on inference, so it uses the chat timeout.
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let url = self.url(&["chat"])?;
        let body = ChatRequest {
            message: request.message.trim().to_string(),
            ..request.clone()
        };
        self.fetch_json(
            self.client.post(url).json(&body),
            self.chat_timeout,
            "Failed to send message",
        )
        .await
    }

    /// POST /analyze-request: suggested mode and name for a special session.
    async fn analyze_request(&self, description: &str) -> Result<Analysis, ApiError> {
        let url = self.url(&["analyze-request"])?;
        let body = AnalyzeRequest {
            description: description.trim(),
        };
        self.fetch_json(
            self.client.post(url).json(&body),
            self.chat_timeout,
            "Failed to analyze request",
        )
        .await
    }

    /// POST /erase: wipes every session; the backend creates one replacement.
    async fn erase_all_data(&self) -> Result<EraseReceipt, ApiError> {
        let url = self.url(&["erase"])?;
        self.fetch_json(
            self.client.post(url),
            self.request_timeout,
            "Failed to erase data",
        )
        .await
    }

    /// GET /history: legacy cross-session listing; empty when offline.
    async fn chat_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let url = self.url(&["history"])?;
        let res = self
            .fetch_json(
                self.client.get(url),
                self.request_timeout,
                "Failed to fetch chat history",
            )
            .await;
        degrade(res, "chat history", Vec::new)
    }
}
