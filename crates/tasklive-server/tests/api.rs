use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tasklive_api::auth::{AppState, AppStateInner};
use tasklive_db::Database;
use tasklive_gateway::dispatcher::Dispatcher;
use tasklive_server::router;
use tasklive_types::events::GatewayEvent;

fn test_state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "integration-secret".into(),
        token_ttl: chrono::Duration::hours(1),
        dispatcher: Dispatcher::new(),
    })
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
    let response = router(state.clone()).oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn register_and_login(state: &AppState, username: &str, email: &str) -> String {
    let (status, _) = send(
        state,
        request(
            "POST",
            "/api/register",
            None,
            Some(json!({"username": username, "email": email, "password": "hunter2!"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        state,
        request(
            "POST",
            "/api/login",
            None,
            Some(json!({"email": email, "password": "hunter2!"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let state = test_state();

    let payload = json!({"username": "u1", "email": "u1@example.com", "password": "hunter2!"});
    let (status, _) = send(&state, request("POST", "/api/register", None, Some(payload.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&state, request("POST", "/api/register", None, Some(payload))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_identity");
}

#[tokio::test]
async fn login_failure_does_not_reveal_which_check_failed() {
    let state = test_state();
    register_and_login(&state, "u1", "u1@example.com").await;

    let (status, body) = send(
        &state,
        request(
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "u1@example.com", "password": "wrong"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, body) = send(
        &state,
        request(
            "POST",
            "/api/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "wrong"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn tasks_require_a_verifiable_token() {
    let state = test_state();

    let (status, body) = send(&state, request("GET", "/tasks", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, body) = send(&state, request("GET", "/tasks", Some("garbage"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn full_session_lifecycle() {
    let state = test_state();
    let token = register_and_login(&state, "u1", "u1@example.com").await;

    // A channel opened by some other client is already listening.
    let mut channel = state.dispatcher.subscribe();

    // Create
    let (status, task) = send(
        &state,
        request("POST", "/tasks", Some(&token), Some(json!({"title": "x"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["title"], "x");
    assert_eq!(task["completed"], false);
    let task_id = task["id"].as_str().unwrap().to_owned();

    // Update
    let (status, updated) = send(
        &state,
        request(
            "PUT",
            &format!("/tasks/{task_id}"),
            Some(&token),
            Some(json!({"completed": true})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "x");
    assert_eq!(updated["completed"], true);

    // Delete
    let (status, _) = send(
        &state,
        request("DELETE", &format!("/tasks/{task_id}"), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The channel saw all three mutations, in the order they were applied.
    match channel.try_recv().unwrap() {
        GatewayEvent::TaskAdded(t) => {
            assert_eq!(t.id.to_string(), task_id);
            assert_eq!(t.title, "x");
        }
        other => panic!("expected taskAdded, got {other:?}"),
    }
    match channel.try_recv().unwrap() {
        GatewayEvent::TaskUpdated(t) => assert!(t.completed),
        other => panic!("expected taskUpdated, got {other:?}"),
    }
    match channel.try_recv().unwrap() {
        GatewayEvent::TaskDeleted { task_id: deleted } => {
            assert_eq!(deleted.to_string(), task_id)
        }
        other => panic!("expected taskDeleted, got {other:?}"),
    }

    // Logout is idempotent
    for _ in 0..2 {
        let (status, _) = send(&state, request("POST", "/api/logout", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // The old token is a closed session, distinct from never-logged-in.
    let (status, body) = send(&state, request("GET", "/tasks", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "session_closed");
}

#[tokio::test]
async fn tasks_are_isolated_between_users() {
    let state = test_state();
    let token_a = register_and_login(&state, "alice", "alice@example.com").await;
    let token_b = register_and_login(&state, "bob", "bob@example.com").await;

    let (status, task) = send(
        &state,
        request(
            "POST",
            "/tasks",
            Some(&token_a),
            Some(json!({"title": "alice's"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_str().unwrap().to_owned();

    // Bob never sees Alice's tasks.
    let (status, body) = send(&state, request("GET", "/tasks", Some(&token_b), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    // Nor can he mutate them — absent and not-owned are indistinguishable.
    let (status, body) = send(
        &state,
        request(
            "PUT",
            &format!("/tasks/{task_id}"),
            Some(&token_b),
            Some(json!({"title": "stolen"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send(
        &state,
        request("DELETE", &format!("/tasks/{task_id}"), Some(&token_b), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Alice's task is untouched.
    let (status, body) = send(&state, request("GET", "/tasks", Some(&token_a), None)).await;
    assert_eq!(status, StatusCode::OK);
    let tasks = body.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "alice's");
}

#[tokio::test]
async fn websocket_handshake_and_fan_out() {
    let state = test_state();
    let token_a = register_and_login(&state, "alice", "alice@example.com").await;
    let token_b = register_and_login(&state, "bob", "bob@example.com").await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // No token parameter, or a bad one — either way the connection is
    // rejected before the channel is established.
    for uri in [format!("ws://{addr}/ws"), format!("ws://{addr}/ws?token=garbage")] {
        let err = tokio_tungstenite::connect_async(uri).await.unwrap_err();
        match err {
            tokio_tungstenite::tungstenite::Error::Http(response) => {
                assert_eq!(response.status(), StatusCode::UNAUTHORIZED)
            }
            other => panic!("expected HTTP rejection, got {other:?}"),
        }
    }

    // Two channels, owned by different users.
    let (mut ws_a, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token={token_a}"))
        .await
        .unwrap();

    // The handshake skips the revocation ledger: a logged-out token still
    // opens a channel until it expires naturally.
    let (status, _) = send(&state, request("POST", "/api/logout", Some(&token_b), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (mut ws_b, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws?token={token_b}"))
        .await
        .unwrap();

    // A mutation by Alice fans out to every open channel, Bob's included.
    let (status, task) = send(
        &state,
        request(
            "POST",
            "/tasks",
            Some(&token_a),
            Some(json!({"title": "live"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_str().unwrap().to_owned();

    for ws in [&mut ws_a, &mut ws_b] {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .unwrap();
        let event: GatewayEvent = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        match event {
            GatewayEvent::TaskAdded(t) => {
                assert_eq!(t.id.to_string(), task_id);
                assert_eq!(t.title, "live");
            }
            other => panic!("expected taskAdded, got {other:?}"),
        }
    }
}
