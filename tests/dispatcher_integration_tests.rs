use std::sync::Arc;
use std::time::Duration;

use confcraft::backend::HttpBackend;
use confcraft::core::config::{ConfcraftConfig, resolve};
use confcraft::core::diff::DiffKind;
use confcraft::core::dispatcher::{DispatchError, DispatchState, MessageDispatcher};
use confcraft::core::store::StoreEvent;
use confcraft::core::types::Role;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn dispatcher_for(server: &MockServer) -> MessageDispatcher {
    let config = resolve(&ConfcraftConfig::default(), Some(server.uri().as_str()));
    let backend = HttpBackend::new(config.base_url.clone(), Duration::from_secs(5)).unwrap();
    MessageDispatcher::from_config(Arc::new(backend), &config)
}

async fn mount_history(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/chat_history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ============================================================================
// Send cycle
// ============================================================================

#[tokio::test]
async fn test_backend_failure_falls_back_locally() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat_builder_agent"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let dispatcher = dispatcher_for(&mock_server);
    let outcome = assert_ok!(dispatcher.send("create an agent").await);

    assert!(outcome.used_fallback);
    assert!(outcome.reply.content.contains("create an agent"));

    let store = dispatcher.store();
    let roles: Vec<Role> = store.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    let agents = store.artifacts().unwrap().get("agents.yaml").unwrap();
    assert!(agents.contains("create an agent"));
    assert_eq!(store.active_id(), None);
    assert_eq!(dispatcher.state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_successful_send_adopts_id_and_diffs_artifacts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat_builder_agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Added a researcher agent",
            "yaml_files": [
                { "name": "agents.yaml", "content": "```yaml\nagents:\n  researcher:\n    model: gpt-4\n```" },
                { "name": "notes.txt", "content": "ignored" }
            ],
            "chat_id": "c-42"
        })))
        .mount(&mock_server)
        .await;
    mount_history(
        &mock_server,
        json!([{ "id": "c-42", "name": "Chat", "created_at": "2025-03-01 10:00:00", "message_count": 2 }]),
    )
    .await;

    let dispatcher = dispatcher_for(&mock_server);
    let mut events = dispatcher.subscribe();
    let outcome = assert_ok!(dispatcher.send("add a researcher").await);

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.reply.content, "Added a researcher agent");

    let agents = &outcome.artifacts[0];
    assert_eq!(agents.content, "agents:\n  researcher:\n    model: gpt-4\n");
    assert!(agents.changed);
    assert!(agents.lines.iter().any(|l| l.kind == DiffKind::Insert && l.text.contains("researcher")));
    assert!(!outcome.artifacts[1].changed);
    assert_eq!(outcome.artifacts.len(), 2);

    {
        let store = dispatcher.store();
        assert_eq!(store.active_id(), Some("c-42"));
        assert_eq!(store.roster().len(), 1);
    }

    let mut saw_artifact_update = false;
    while let Ok(event) = events.try_recv() {
        if let StoreEvent::ArtifactsUpdated(names) = event {
            assert_eq!(names, vec!["agents.yaml".to_string()]);
            saw_artifact_update = true;
        }
    }
    assert!(saw_artifact_update);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_load_unknown_session_reports_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/chat_session/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dispatcher = dispatcher_for(&mock_server);
    let err = assert_err!(dispatcher.load_session("gone").await);
    assert!(matches!(err, DispatchError::NotFound(id) if id == "gone"));
    assert_eq!(dispatcher.state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_delete_all_starts_a_new_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/delete_all_chats"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat_sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "chat_id": "fresh" })))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_history(
        &mock_server,
        json!([{ "id": "fresh", "name": "Chat", "created_at": "2025-03-01 10:00:00" }]),
    )
    .await;

    let dispatcher = dispatcher_for(&mock_server);
    assert_ok!(dispatcher.delete_all_sessions().await);

    let store = dispatcher.store();
    assert_eq!(store.active_id(), Some("fresh"));
    assert!(store.messages().is_empty());
    assert_eq!(store.roster().len(), 1);
}

#[tokio::test]
async fn test_create_session_failure_surfaces_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat_sessions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dispatcher = dispatcher_for(&mock_server);
    let err = assert_err!(dispatcher.create_session(Some("x")).await);
    assert!(matches!(err, DispatchError::Transport(_)));
    assert_eq!(dispatcher.store().active_id(), None);
}
