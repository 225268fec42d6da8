//! Integration tests: `SessionController` driving a wiremock backend end to end.

use std::path::Path;
use std::time::Duration;

use hushchat::api::ApiClient;
use hushchat::pipeline::{Origin, Role};
use hushchat::session::{AppState, NoticeLevel, SessionController, StoreError};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_json(id: &str, name: &str, mode: &str, updated_at: &str, is_special: bool) -> Value {
    json!({
        "id": id, "name": name, "mode": mode,
        "created_at": "2024-05-01T09:00:00", "updated_at": updated_at,
        "is_special": is_special, "message_count": 1
    })
}

fn message_json(session_id: &str, id: &str, user: &str, ai: &str, mode: &str) -> Value {
    json!({
        "id": id, "session_id": session_id, "user_message": user, "ai_response": ai,
        "mode": mode, "timestamp": "2024-05-01T10:00:00"
    })
}

fn modes_json() -> Value {
    json!([
        {"id": "general", "name": "General Assistant", "description": "Helpful AI assistant for general questions"},
        {"id": "coding", "name": "Coding Assistant", "description": "Programming help and technical guidance"},
        {"id": "business", "name": "Business Advisor", "description": "Professional business advice and strategy"},
        {"id": "creative", "name": "Creative Writer", "description": "Creative writing and content creation"}
    ])
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Health and modes always answer; sessions are mounted per test.
async fn online_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;
    mount_get(&server, "/modes", modes_json()).await;
    server
}

fn controller(uri: &str, export_dir: &Path) -> SessionController<ApiClient> {
    let client = ApiClient::new(Some(uri.to_string()))
        .with_timeouts(Duration::from_millis(300), Duration::from_secs(5));
    SessionController::new(client, AppState::default(), export_dir)
}

#[tokio::test]
async fn fresh_start_with_no_sessions() {
    let server = online_backend().await;
    mount_get(&server, "/sessions", json!([])).await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();

    let state = ctl.state();
    assert!(state.is_connected());
    assert_eq!(state.modes().len(), 4);
    assert!(state.sessions().is_empty());
    assert!(state.active_session_id().is_none());
    assert!(state.messages().is_empty());
    assert_eq!(state.current_mode(), "general");
}

#[tokio::test]
async fn offline_start_uses_fallbacks() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&format!("http://127.0.0.1:{}", port), dir.path());
    ctl.initialize().await.unwrap();

    assert!(!ctl.state().is_connected());
    assert_eq!(ctl.state().modes().len(), 4);
    assert!(ctl.state().sessions().is_empty());

    let err = ctl.send_message("hello").await.unwrap_err();
    assert!(matches!(err, StoreError::Offline));
    assert!(ctl.state().messages().is_empty());
}

#[tokio::test]
async fn initialize_activates_most_recent_session() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([
            session_json("old", "Old chat", "general", "2024-05-01T10:00:00", false),
            session_json("new", "Refactor plan", "coding", "2024-05-03T08:30:00.123456", false),
        ]),
    )
    .await;
    mount_get(
        &server,
        "/sessions/new/messages",
        json!([
            message_json("new", "m1", "what is a trait?", "An interface.", "coding"),
            message_json("new", "m2", "and generics?", "Type parameters.", "coding"),
        ]),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();

    let state = ctl.state();
    assert_eq!(state.active_session_id(), Some("new"));
    assert_eq!(state.current_mode(), "coding");
    let roles: Vec<Role> = state.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(state.messages()[0].id, "user-m1");
    assert_eq!(state.messages()[3].text, "Type parameters.");
}

#[tokio::test]
async fn failed_message_load_does_not_block_startup() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([session_json("s1", "Broken", "coding", "2024-05-01T10:00:00", false)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db locked"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();

    let state = ctl.state();
    assert!(state.is_connected());
    assert_eq!(state.sessions().len(), 1);
    assert_eq!(state.active_session_id(), Some("s1"));
    assert!(state.messages().is_empty());
    assert_eq!(state.last_error(), Some("db locked"));
    let notices = ctl.take_notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.text == "db locked"));

    // the broken session can still be removed
    ctl.delete_session("s1").await.unwrap();
    assert!(ctl.state().sessions().is_empty());
}

#[tokio::test]
async fn special_session_is_created_without_sending_description() {
    let server = online_backend().await;
    mount_get(&server, "/sessions", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/analyze-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "suggested_mode": "coding",
            "suggested_name": "Rust Lifetimes",
            "mode_info": {"id": "coding", "name": "Coding Assistant", "description": "Programming help and technical guidance"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(body_partial_json(json!({
            "name": "Rust Lifetimes",
            "mode": "coding",
            "is_special": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(
            "sp1",
            "Rust Lifetimes",
            "coding",
            "2024-05-04T12:00:00",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    let description = "help me understand borrow checker lifetimes";
    let analysis = ctl.analyze_request(description).await.unwrap();
    assert_eq!(analysis.suggested_mode, "coding");

    let session = ctl
        .create_special_session(&analysis.suggested_name, &analysis.suggested_mode, description)
        .await
        .unwrap();
    assert!(session.is_special);

    let state = ctl.state();
    assert_eq!(state.active_session_id(), Some("sp1"));
    assert_eq!(state.current_mode(), "coding");
    assert!(state.messages().is_empty());
    assert_eq!(state.sessions()[0].id, "sp1");

    let requests = server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/sessions")
        .unwrap();
    let body = String::from_utf8_lossy(&create.body);
    assert!(!body.contains("borrow checker"));

    let notices = ctl.take_notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Success && n.text.contains("Rust Lifetimes")));
}

#[tokio::test]
async fn special_session_rejects_unknown_mode_locally() {
    let server = online_backend().await;
    mount_get(&server, "/sessions", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    let err = ctl
        .create_special_session("Contracts", "legal", "review my lease")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownMode(m) if m == "legal"));
    assert!(ctl.analyze_request("   ").await.is_err());
}

#[tokio::test]
async fn empty_rename_makes_no_backend_call() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([session_json("s1", "Groceries", "general", "2024-05-01T10:00:00", false)]),
    )
    .await;
    mount_get(&server, "/sessions/s1/messages", json!([])).await;
    Mock::given(method("PUT"))
        .and(path("/sessions/s1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    let err = ctl.rename_session("s1", "   ").await.unwrap_err();
    assert!(matches!(err, StoreError::EmptyName));
    assert_eq!(ctl.state().sessions()[0].name, "Groceries");
    // unchanged name is a no-op too
    ctl.rename_session("s1", " Groceries ").await.unwrap();
}

#[tokio::test]
async fn rejected_rename_keeps_old_name() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([session_json("s1", "Groceries", "general", "2024-05-01T10:00:00", false)]),
    )
    .await;
    mount_get(&server, "/sessions/s1/messages", json!([])).await;
    Mock::given(method("PUT"))
        .and(path("/sessions/s1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Session not found"})))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    let err = ctl.rename_session("s1", "Weekly shop").await.unwrap_err();
    assert_eq!(err.to_string(), "Session not found");
    assert_eq!(ctl.state().sessions()[0].name, "Groceries");
    assert_eq!(ctl.state().last_error(), Some("Session not found"));
}

#[tokio::test]
async fn rename_after_refresh_survives() {
    let server = online_backend().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_json(
            "s1",
            "Chat 1",
            "general",
            "2024-05-01T10:00:00",
            false
        )])))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_json(
            "s1",
            "Holiday plans",
            "general",
            "2024-05-01T10:05:00",
            false
        )])))
        .mount(&server)
        .await;
    mount_get(&server, "/sessions/s1/messages", json!([])).await;
    Mock::given(method("PUT"))
        .and(path("/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(
            "s1",
            "Holiday plans",
            "general",
            "2024-05-01T10:05:00",
            false,
        )))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    ctl.refresh_sessions().await.unwrap();
    ctl.rename_session("s1", "Holiday plans").await.unwrap();
    assert_eq!(ctl.state().sessions()[0].name, "Holiday plans");
    ctl.refresh_sessions().await.unwrap();
    assert_eq!(ctl.state().sessions()[0].name, "Holiday plans");
}

#[tokio::test]
async fn deleting_active_session_activates_first_remaining() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([
            session_json("a", "First", "creative", "2024-05-01T10:00:00", false),
            session_json("b", "Second", "business", "2024-05-02T10:00:00", false),
            session_json("c", "Third", "general", "2024-04-01T10:00:00", false),
        ]),
    )
    .await;
    mount_get(
        &server,
        "/sessions/b/messages",
        json!([message_json("b", "m1", "q", "a", "business")]),
    )
    .await;
    mount_get(
        &server,
        "/sessions/a/messages",
        json!([message_json("a", "m2", "poem?", "Roses...", "creative")]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Session deleted successfully"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Session deleted successfully"})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    assert_eq!(ctl.state().active_session_id(), Some("b"));

    ctl.delete_session("b").await.unwrap();
    let state = ctl.state();
    assert_eq!(state.active_session_id(), Some("a"));
    assert_eq!(state.current_mode(), "creative");
    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.messages()[1].text, "Roses...");

    // deleting an inactive session leaves the active one alone
    ctl.delete_session("c").await.unwrap();
    assert_eq!(ctl.state().active_session_id(), Some("a"));
    assert_eq!(ctl.state().sessions().len(), 1);
}

#[tokio::test]
async fn deleting_last_session_clears_buffer() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([session_json("only", "Only", "general", "2024-05-01T10:00:00", false)]),
    )
    .await;
    mount_get(
        &server,
        "/sessions/only/messages",
        json!([message_json("only", "m1", "hi", "hello", "general")]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    ctl.delete_session("only").await.unwrap();
    assert!(ctl.state().active_session_id().is_none());
    assert!(ctl.state().messages().is_empty());
    assert!(ctl.state().sessions().is_empty());
}

#[tokio::test]
async fn first_message_adopts_new_session() {
    let server = online_backend().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_json(
            "fresh",
            "hello there",
            "general",
            "2024-05-05T10:00:00",
            false
        )])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({"message": "hello there", "mode": "general", "save_history": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Hi! How can I help?",
            "message_id": "m1",
            "session_id": "fresh",
            "mode": "general"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    assert!(ctl.state().active_session_id().is_none());

    ctl.send_message(" hello there ").await.unwrap();
    let state = ctl.state();
    assert_eq!(state.active_session_id(), Some("fresh"));
    assert_eq!(state.sessions().len(), 1);
    assert!(!state.send_state().is_pending());
    let msgs = state.messages();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].role, Role::User);
    assert_eq!(msgs[0].origin, Origin::Optimistic);
    assert_eq!(msgs[1].role, Role::Assistant);
    assert_eq!(msgs[1].text, "Hi! How can I help?");
}

#[tokio::test]
async fn unreachable_send_leaves_one_error_entry() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([session_json("s1", "Chat", "general", "2024-05-01T10:00:00", false)]),
    )
    .await;
    mount_get(&server, "/sessions/s1/messages", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "too late", "session_id": "s1", "mode": "general"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    let err = ctl.send_message("are you there?").await.unwrap_err();
    assert!(matches!(err, StoreError::Api(ref e) if e.is_unavailable()));

    let state = ctl.state();
    assert!(!state.is_connected());
    assert!(!state.send_state().is_pending());
    let errors: Vec<_> = state
        .messages()
        .iter()
        .filter(|m| m.origin == Origin::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].role, Role::Assistant);
    assert!(errors[0].text.starts_with("Sorry, I encountered an error:"));
    assert_eq!(state.messages().len(), 2);
    assert!(state.last_error().is_some());

    // sends stay disabled until the connection is re-checked
    assert!(matches!(
        ctl.send_message("again").await,
        Err(StoreError::Offline)
    ));
    assert!(ctl.check_connection().await.unwrap());
    assert!(ctl.state().is_connected());
}

#[tokio::test]
async fn erase_resets_and_picks_up_replacement_session() {
    let server = online_backend().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            session_json("a", "One", "coding", "2024-05-01T10:00:00", false),
            session_json("b", "Two", "business", "2024-05-02T10:00:00", true),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([session_json(
            "blank",
            "New Chat",
            "general",
            "2024-05-06T10:00:00",
            false
        )])))
        .mount(&server)
        .await;
    mount_get(
        &server,
        "/sessions/b/messages",
        json!([message_json("b", "m1", "q", "a", "business")]),
    )
    .await;
    mount_get(&server, "/sessions/blank/messages", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/erase"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "All data erased successfully",
            "new_session_id": "blank"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    assert_eq!(ctl.state().messages().len(), 2);

    ctl.erase_all_data().await.unwrap();
    let state = ctl.state();
    assert_eq!(state.active_session_id(), Some("blank"));
    assert_eq!(state.sessions().len(), 1);
    assert!(state.messages().is_empty());
    assert_eq!(state.current_mode(), "general");
    assert!(state.last_error().is_none());
}

#[tokio::test]
async fn export_writes_bundle_to_disk() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([session_json("s1", "Trip/Plan", "general", "2024-05-01T10:00:00", false)]),
    )
    .await;
    mount_get(&server, "/sessions/s1/messages", json!([])).await;
    mount_get(
        &server,
        "/sessions/s1/export",
        json!({
            "session": {
                "id": "s1", "name": "Trip/Plan", "mode": "general",
                "created_at": "2024-05-01T09:00:00", "updated_at": "2024-05-01T10:00:00",
                "is_special": false, "message_count": 1
            },
            "messages": [message_json("s1", "m1", "where to?", "Lisbon.", "general")],
            "exported_at": "2024-05-07T08:00:00"
        }),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    let written = ctl.export_session("s1").await.unwrap();

    assert!(written.starts_with(dir.path()));
    let file_name = written.file_name().unwrap().to_string_lossy().to_string();
    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    assert_eq!(file_name, format!("chat-session-Trip_Plan-{}.json", today));

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&written).unwrap()).unwrap();
    assert_eq!(saved["session"]["name"], "Trip/Plan");
    assert_eq!(saved["messages"][0]["ai_response"], "Lisbon.");
    assert_eq!(saved["exported_at"], "2024-05-07T08:00:00");

    // second export of the same day does not overwrite the first
    let second = ctl.export_session("s1").await.unwrap();
    assert_ne!(second, written);
}

#[tokio::test]
async fn switching_sessions_adopts_mode_and_reloads() {
    let server = online_backend().await;
    mount_get(
        &server,
        "/sessions",
        json!([
            session_json("a", "Story", "creative", "2024-05-02T10:00:00", false),
            session_json("b", "Pitch", "business", "2024-05-01T10:00:00", false),
        ]),
    )
    .await;
    mount_get(&server, "/sessions/a/messages", json!([])).await;
    mount_get(
        &server,
        "/sessions/b/messages",
        json!([message_json("b", "m9", "pricing?", "Value-based.", "business")]),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();

    let mut ctl = controller(&server.uri(), dir.path());
    ctl.initialize().await.unwrap();
    assert_eq!(ctl.state().current_mode(), "creative");

    ctl.set_mode("coding").unwrap();
    assert_eq!(ctl.state().current_mode(), "coding");
    assert!(ctl.set_mode("astrology").is_err());

    ctl.select_session("b").await.unwrap();
    assert_eq!(ctl.state().current_mode(), "business");
    assert_eq!(ctl.state().messages()[1].text, "Value-based.");

    assert!(matches!(
        ctl.select_session("zzz").await,
        Err(StoreError::UnknownSession(_))
    ));
    assert_eq!(ctl.state().active_session_id(), Some("b"));
}
