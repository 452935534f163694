//! HTTP + WebSocket control plane.
//!
//! | Route              | Purpose                                   |
//! |--------------------|-------------------------------------------|
//! | `GET /api/health`  | liveness                                  |
//! | `GET /api/units`   | list units with their version keys        |
//! | `POST /api/open`   | open a version file in a tool             |
//! | `POST /api/command`| run one mutation command                  |
//! | `GET /api/ws`      | push channel plus commands                |

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use variants_sync::ErrorKind;

use crate::error::DaemonError;
use crate::open::Launcher;
use crate::orchestrator::Orchestrator;
use crate::protocol::{
    decode_request, AckPayload, ClientRequest, ErrorPayload, OpenRequest, ServerMessage,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub launcher: Arc<dyn Launcher>,
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/units", get(list_units))
        .route("/open", post(open_version))
        .route("/command", post(run_command))
        .route("/ws", get(ws_handler));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(state.orchestrator.health().await)
}

async fn list_units(State(state): State<AppState>) -> Result<Response, DaemonError> {
    Ok(Json(state.orchestrator.snapshot().await?).into_response())
}

async fn open_version(
    State(state): State<AppState>,
    Json(request): Json<OpenRequest>,
) -> Result<Response, DaemonError> {
    let opened = state
        .orchestrator
        .open(request, state.launcher.clone())
        .await?;
    Ok(Json(opened).into_response())
}

/// Execute a decoded request and build the reply frame for the requester.
pub async fn answer(orchestrator: &Orchestrator, request: ClientRequest) -> ServerMessage {
    let ClientRequest {
        command,
        request_id,
    } = request;
    let name = command.name();
    match orchestrator.execute(command).await {
        Ok(result) => ServerMessage::Ack(AckPayload {
            command: name.to_string(),
            request_id,
            result,
        }),
        Err(err) => {
            tracing::warn!(command = name, error = %err, "command failed");
            ServerMessage::Error(ErrorPayload::from_error(&err, Some(name), request_id))
        }
    }
}

/// Decode and answer one client frame.
pub async fn answer_value(orchestrator: &Orchestrator, value: Value) -> ServerMessage {
    match decode_request(value) {
        Ok(request) => answer(orchestrator, request).await,
        Err((err, request_id)) => {
            ServerMessage::Error(ErrorPayload::from_error(&err, None, request_id))
        }
    }
}

async fn run_command(State(state): State<AppState>, Json(value): Json<Value>) -> Response {
    let reply = answer_value(&state.orchestrator, value).await;
    let status = match &reply {
        ServerMessage::Error(payload) => status_for(payload.kind),
        _ => StatusCode::OK,
    };
    (status, Json(reply)).into_response()
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_message<S>(sender: &mut S, message: &ServerMessage) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    match serde_json::to_string(message) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize push message");
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.orchestrator.subscribe();

    match state.orchestrator.snapshot().await {
        Ok(snapshot) => {
            if !send_message(&mut sender, &ServerMessage::UnitsSnapshot(snapshot)).await {
                return;
            }
        }
        Err(err) => tracing::warn!(error = %err, "initial snapshot failed"),
    }

    loop {
        select! {
            event = events.recv() => {
                match event {
                    Ok(message) => {
                        if !send_message(&mut sender, &message).await {
                            tracing::debug!("push subscriber disconnected; dropping");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "push subscriber lagged; skipping messages");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                let Some(Ok(frame)) = incoming else { break };
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let reply = match serde_json::from_str::<Value>(text.as_str()) {
                    Ok(value) => answer_value(&state.orchestrator, value).await,
                    Err(err) => ServerMessage::Error(ErrorPayload::from_error(
                        &DaemonError::Json(err),
                        None,
                        None,
                    )),
                };
                if !send_message(&mut sender, &reply).await {
                    break;
                }
            }
        }
    }
}
