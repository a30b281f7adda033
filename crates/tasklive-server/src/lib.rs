use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use tasklive_api::auth::{self, AppState};
use tasklive_api::middleware::{decode_claims, require_auth};
use tasklive_api::tasks;
use tasklive_gateway::connection;

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/{id}",
            axum::routing::put(tasks::update_task).delete(tasks::delete_task),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new().route("/ws", get(ws_upgrade)).with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// The realtime handshake: the token arrives as a connection-setup query
/// parameter rather than a header. Only signature and expiry are checked
/// here; the revocation ledger is a REST-side concern (see DESIGN.md).
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = query.token else {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    };

    let claims = match decode_claims(&token, &state.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "invalid or expired token").into_response();
        }
    };

    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| connection::handle_socket(socket, dispatcher, claims))
}
