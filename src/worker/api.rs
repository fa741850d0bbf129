use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State as AxumState, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{stats::Stats, types::Worker};
use crate::tasks::types::{Event, State, Task};

/// Error body returned for rejected requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrResponse {
    pub http_status_code: u16,
    pub message: String,
}

impl ErrResponse {
    fn bad_request(message: String) -> Response {
        let body = ErrResponse {
            http_status_code: StatusCode::BAD_REQUEST.as_u16(),
            message,
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

pub struct TaskServer {
    pub worker: Arc<Worker>,
    pub address: String,
    pub port: u16,
}

impl TaskServer {
    pub fn new(worker: Arc<Worker>, address: &str, port: u16) -> Self {
        Self {
            worker,
            address: address.to_string(),
            port,
        }
    }

    pub fn router(worker: Arc<Worker>) -> Router {
        Router::new()
            .route("/tasks", get(get_tasks).post(start_task))
            .route("/tasks/", delete(missing_task_id))
            .route("/tasks/{task_id}", delete(stop_task))
            .route("/stats", get(get_stats))
            .with_state(worker)
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn start_server(self, shutdown: CancellationToken) -> std::io::Result<()> {
        let listener = TcpListener::bind((self.address.as_str(), self.port)).await?;
        info!(address = %self.address, port = self.port, "TaskServer listening");

        axum::serve(listener, Self::router(self.worker))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    }
}

async fn get_tasks(AxumState(worker): AxumState<Arc<Worker>>) -> Json<Vec<Task>> {
    Json(worker.get_tasks().await)
}

async fn start_task(
    AxumState(worker): AxumState<Arc<Worker>>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Response {
    let Json(event) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let message = format!("Error unmarshalling body: {}", rejection.body_text());
            error!("{}", message);
            return ErrResponse::bad_request(message);
        }
    };

    let task = event.task;
    worker.add_task(task.clone()).await;
    info!(task_id = %task.id, event_id = %event.id, "Added task");

    (StatusCode::CREATED, Json(task)).into_response()
}

async fn stop_task(
    AxumState(worker): AxumState<Arc<Worker>>,
    Path(task_id): Path<String>,
) -> Response {
    let id = match Uuid::parse_str(&task_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Invalid task id");
            return ErrResponse::bad_request(format!("Invalid task id {task_id}: {e}"));
        }
    };

    let Some(mut task) = worker.get_task(&id).await else {
        warn!(task_id = %id, "No task found");
        return ErrResponse::bad_request(format!("No task with id {id} found"));
    };

    task.state = State::Completed;
    info!(task_id = %id, container_id = ?task.container_id, "Added task to stop container");
    worker.add_task(task).await;

    StatusCode::NO_CONTENT.into_response()
}

async fn missing_task_id() -> Response {
    warn!("No task id in the request");
    ErrResponse::bad_request("No task id in the request".to_string())
}

async fn get_stats(AxumState(worker): AxumState<Arc<Worker>>) -> Json<Stats> {
    Json(worker.stats().await)
}
