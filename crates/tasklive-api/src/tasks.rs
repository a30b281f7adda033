use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use tasklive_db::models::TaskRow;
use tasklive_types::api::{Claims, CreateTaskRequest, UpdateTaskRequest};
use tasklive_types::events::GatewayEvent;
use tasklive_types::models::Task;

use crate::auth::AppState;
use crate::error::{ApiError, join_error};

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let owner = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.list_tasks(&owner))
        .await
        .map_err(join_error)??;

    let tasks = rows
        .into_iter()
        .map(into_task)
        .collect::<Result<Vec<Task>, _>>()?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = Uuid::new_v4();

    let db = state.clone();
    let owner = claims.sub.to_string();
    let id = task_id.to_string();
    let title = req.title.clone();
    let completed = req.completed;
    tokio::task::spawn_blocking(move || db.db.insert_task(&id, &owner, &title, completed))
        .await
        .map_err(join_error)??;

    let task = Task {
        id: task_id,
        title: req.title,
        completed: req.completed,
        owner_id: claims.sub,
    };

    // Broadcast only once the row is durably in place. Every open channel
    // receives the event, not just the mutating user's own.
    state
        .dispatcher
        .broadcast(GatewayEvent::TaskAdded(task.clone()));

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let owner = claims.sub.to_string();
    let id = task_id.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.db
            .update_task(&id, &owner, req.title.as_deref(), req.completed)
    })
    .await
    .map_err(join_error)??
    .ok_or(ApiError::NotFoundOrForbidden)?;

    let task = into_task(row)?;

    state
        .dispatcher
        .broadcast(GatewayEvent::TaskUpdated(task.clone()));

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let owner = claims.sub.to_string();
    let id = task_id.to_string();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_task(&id, &owner))
        .await
        .map_err(join_error)??;

    if !deleted {
        return Err(ApiError::NotFoundOrForbidden);
    }

    state
        .dispatcher
        .broadcast(GatewayEvent::TaskDeleted { task_id });

    Ok(StatusCode::NO_CONTENT)
}

/// A row that doesn't parse is corrupt storage, never a nil-UUID task on
/// the wire — same policy as the user-id parse in auth.
fn into_task(row: TaskRow) -> Result<Task, ApiError> {
    let id = row.id.parse().map_err(|e| {
        error!("corrupt task id '{}': {}", row.id, e);
        ApiError::Persistence
    })?;
    let owner_id = row.owner_id.parse().map_err(|e| {
        error!("corrupt owner_id '{}' on task '{}': {}", row.owner_id, row.id, e);
        ApiError::Persistence
    })?;

    Ok(Task {
        id,
        title: row.title,
        completed: row.completed,
        owner_id,
    })
}
