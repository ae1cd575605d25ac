//! C8 — JSON-RPC Dispatcher.
//!
//! Accepts JSON-RPC 2.0 envelopes at `/` and `/a2a`. Grounded on the
//! teacher's `routes<A>() -> Router<A>` generic-state pattern
//! (`handlers.rs`) and its per-handler `#[instrument(skip_all)]`; the
//! error-envelope shape itself has no teacher counterpart (the teacher
//! speaks REST, not JSON-RPC) and is built directly from `spec.md` §4.7/§6.2.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::extensions;
use crate::model::message::Message;
use crate::model::task::TaskState;
use crate::state::context::AppState;
use crate::state_machine::{self, StateMachineError};

/// JSON-RPC error kinds, per `spec.md` §7's error-code table. A JSON-RPC
/// error always rides inside a 200 OK envelope's `error` field rather than an
/// HTTP error status, so this — unlike [`crate::rest::RestError`] — carries
/// no `IntoResponse` impl; `RpcResponse::from_error` folds it into the
/// envelope alongside the caller's request id.
#[derive(Debug, thiserror::Error)]
pub enum JsonRpcError {
    #[error("jsonrpc must be \"2.0\"")]
    MalformedEnvelope,
    #[error("unknown method {0}")]
    UnknownMethod(String),
    #[error("{0}")]
    InvalidParams(String),
    #[error("no task with id {0}")]
    TaskNotFound(String),
}

impl JsonRpcError {
    pub(crate) fn code(&self) -> i32 {
        match self {
            JsonRpcError::MalformedEnvelope => -32600,
            JsonRpcError::UnknownMethod(_) => -32601,
            JsonRpcError::InvalidParams(_) => -32602,
            JsonRpcError::TaskNotFound(_) => -32001,
        }
    }

    /// Every variant this enum defines, one instance each — used by the
    /// `/a2a-x402-test` self-test to verify the advertised error-code set
    /// actually matches what this dispatcher can produce.
    pub(crate) fn all_kinds() -> [JsonRpcError; 4] {
        [
            JsonRpcError::MalformedEnvelope,
            JsonRpcError::UnknownMethod(String::new()),
            JsonRpcError::InvalidParams(String::new()),
            JsonRpcError::TaskNotFound(String::new()),
        ]
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(rpc_handler)).route("/a2a", post(rpc_handler))
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct RpcErrorBody {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        RpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn from_error(id: Value, error: JsonRpcError) -> Self {
        RpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcErrorBody { code: error.code(), message: error.to_string() }),
        }
    }
}

#[instrument(skip_all)]
pub async fn rpc_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(request): Json<RpcRequest>) -> Response {
    let requested_extension = headers.get("X-A2A-Extensions").and_then(|v| v.to_str().ok());
    let echoed_extension = extensions::negotiate(requested_extension);

    let body = dispatch(&state, &request).await;
    let mut response = (StatusCode::OK, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(echoed_extension) {
        response.headers_mut().insert("X-A2A-Extensions", value);
    }
    response
}

async fn dispatch(state: &AppState, request: &RpcRequest) -> RpcResponse {
    if request.jsonrpc != "2.0" {
        return RpcResponse::from_error(request.id.clone(), JsonRpcError::MalformedEnvelope);
    }
    match request.method.as_str() {
        "message/send" | "tasks/send" => handle_send(state, request).await,
        "tasks/get" => handle_get(state, request).await,
        "tasks/cancel" => handle_cancel(state, request).await,
        other => RpcResponse::from_error(request.id.clone(), JsonRpcError::UnknownMethod(other.to_string())),
    }
}

async fn handle_send(state: &AppState, request: &RpcRequest) -> RpcResponse {
    let message: Message = match request.params.get("message") {
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(message) => message,
            Err(error) => {
                return RpcResponse::from_error(
                    request.id.clone(),
                    JsonRpcError::InvalidParams(format!("params.message is malformed: {error}")),
                );
            }
        },
        None => {
            return RpcResponse::from_error(request.id.clone(), JsonRpcError::InvalidParams("params.message is required".to_string()));
        }
    };
    match state_machine::handle(state, message).await {
        Ok(task) => RpcResponse::ok(request.id.clone(), serde_json::to_value(task).expect("task is always serializable")),
        Err(StateMachineError::MissingTextPart) => {
            RpcResponse::from_error(request.id.clone(), JsonRpcError::InvalidParams("message has no text part".to_string()))
        }
    }
}

async fn handle_get(state: &AppState, request: &RpcRequest) -> RpcResponse {
    let Some(task_id) = request.params.get("id").and_then(Value::as_str) else {
        return RpcResponse::from_error(request.id.clone(), JsonRpcError::InvalidParams("params.id is required".to_string()));
    };
    match state.tasks.get(task_id).await {
        Some(task) => RpcResponse::ok(request.id.clone(), serde_json::to_value(task).expect("task is always serializable")),
        None => RpcResponse::from_error(request.id.clone(), JsonRpcError::TaskNotFound(task_id.to_string())),
    }
}

async fn handle_cancel(state: &AppState, request: &RpcRequest) -> RpcResponse {
    let Some(task_id) = request.params.get("id").and_then(Value::as_str) else {
        return RpcResponse::from_error(request.id.clone(), JsonRpcError::InvalidParams("params.id is required".to_string()));
    };
    let updated = state
        .tasks
        .update(task_id, |t| {
            t.transition(TaskState::Canceled, None);
        })
        .await;
    match updated {
        Some(task) => RpcResponse::ok(request.id.clone(), serde_json::to_value(task).expect("task is always serializable")),
        None => RpcResponse::from_error(request.id.clone(), JsonRpcError::TaskNotFound(task_id.to_string())),
    }
}
