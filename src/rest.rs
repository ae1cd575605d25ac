//! C9 — REST x402 Dispatcher.
//!
//! Exposes each skill at `/x402/<skill-id>` per `spec.md` §4.8: GET always
//! previews payment requirements for a priced skill; POST executes, either
//! directly (free skill, or a priced skill with a payment header attached)
//! or by handing back the same 402 preview (priced skill, no header yet).
//! Grounded on the teacher's `handlers.rs` route-table shape, generalized
//! from per-endpoint routes to one parameterized route per skill.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::instrument;
use uuid::Uuid;

use crate::executor::{self, ExecutorOutput};
use crate::model::event::{Event, EventKind};
use crate::model::message::{Message, Part, PaymentStatus, Role};
use crate::model::payment::{PaymentPayload, PaymentRequirements, Receipt};
use crate::model::skill::{self, Skill};
use crate::model::task::{Task, TaskState};
use crate::state::context::AppState;

/// REST-surface error kinds, per `spec.md` §7's status-code table. Grounded
/// on the teacher's `impl IntoResponse for FacilitatorLocalError`
/// (`handlers.rs`): a `thiserror` enum that maps each variant to its HTTP
/// status and a `{error}` body, rather than building ad hoc response tuples
/// at each call site.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("unknown skill {0}")]
    UnknownSkill(String),
    #[error("free skills only accept POST")]
    MethodNotAllowed,
    #[error("malformed payment header")]
    MalformedPaymentHeader,
    #[error("missing required field \"{0}\"")]
    MissingField(&'static str),
    #[error("executor failed: {0}")]
    ExecutionFailed(String),
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = match &self {
            RestError::UnknownSkill(_) => StatusCode::NOT_FOUND,
            RestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RestError::MalformedPaymentHeader | RestError::MissingField(_) => StatusCode::BAD_REQUEST,
            RestError::ExecutionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/x402/{skill_id}", get(get_requirements))
        .route("/x402/{skill_id}", post(post_execute))
}

#[instrument(skip_all, fields(skill_id = %skill_id))]
async fn get_requirements(Path(skill_id): Path<String>, State(_state): State<Arc<AppState>>) -> Response {
    let Some(skill) = skill::by_id(&skill_id) else {
        return RestError::UnknownSkill(skill_id).into_response();
    };
    if !skill.requires_payment() {
        return RestError::MethodNotAllowed.into_response();
    }
    payment_required_response(skill)
}

#[instrument(skip_all, fields(skill_id = %skill_id))]
async fn post_execute(Path(skill_id): Path<String>, State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let Some(skill) = skill::by_id(&skill_id) else {
        return RestError::UnknownSkill(skill_id).into_response();
    };

    if !skill.requires_payment() {
        return execute_and_respond(&state, skill, body, None).await;
    }

    let payment_header = headers
        .get("Payment-Signature")
        .or_else(|| headers.get("X-Payment"))
        .and_then(|v| v.to_str().ok());
    let Some(payment_header) = payment_header else {
        return payment_required_response(skill);
    };

    let payload: PaymentPayload = match serde_json::from_str(payment_header) {
        Ok(payload) => payload,
        Err(_) => return RestError::MalformedPaymentHeader.into_response(),
    };

    if let Some(missing) = missing_required_field(skill, &body) {
        return RestError::MissingField(missing).into_response();
    }

    execute_and_respond(&state, skill, body, Some(payload)).await
}

fn payment_required_response(skill: &'static Skill) -> Response {
    let requirements = PaymentRequirements::for_skill(skill).expect("priced skill always has requirements");
    (StatusCode::PAYMENT_REQUIRED, Json(requirements)).into_response()
}

fn missing_required_field(skill: &Skill, body: &Value) -> Option<&'static str> {
    let required = match skill.id {
        "screenshot" => "url",
        "markdown-to-pdf" => "markdown",
        "ai-analysis" => "content",
        _ => return None,
    };
    match body.get(required).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => None,
        _ => Some(required),
    }
}

fn rest_task(task_id: &str, skill: &Skill, args: &Value) -> Task {
    let message = Message {
        message_id: Uuid::new_v4().to_string(),
        role: Role::User,
        kind: "message".to_string(),
        parts: vec![Part::Data { data: args.clone() }],
        task_id: None,
        context_id: None,
        metadata: None,
    };
    let mut task = Task::new(task_id.to_string(), Uuid::new_v4().to_string(), message);
    task.metadata.insert("skill".into(), Value::String(skill.id.to_string()));
    task
}

async fn execute_and_respond(state: &AppState, skill: &'static Skill, args: Value, payment: Option<PaymentPayload>) -> Response {
    let task_id = Uuid::new_v4().to_string();
    state.tasks.insert(rest_task(&task_id, skill, &args)).await;

    match payment {
        None => match executor::execute(&state.config, &state.http_client, skill.id, &args).await {
            Ok(output) => {
                state.tasks.update(&task_id, |t| { t.transition(TaskState::Completed, None); }).await;
                build_output_response(StatusCode::OK, &output, None)
            }
            Err(error) => {
                state.tasks.update(&task_id, |t| { t.transition(TaskState::Failed, None); }).await;
                RestError::ExecutionFailed(error.to_string()).into_response()
            }
        },
        Some(payload) => run_paid(state, &task_id, skill, args, payload).await,
    }
}

async fn run_paid(state: &AppState, task_id: &str, skill: &'static Skill, args: Value, payload: PaymentPayload) -> Response {
    let wallet = payload.from.clone();
    let network = payload.network.clone();

    state
        .events
        .append(Event::new(EventKind::PaymentReceived, task_id, skill.id, Some(wallet.clone()), Some(network.clone())))
        .await;
    state
        .events
        .append(Event::new(EventKind::PaymentVerified, task_id, skill.id, Some(wallet.clone()), Some(network.clone())))
        .await;
    state
        .tasks
        .update(task_id, |t| {
            t.set_payment_status(PaymentStatus::PaymentVerified);
            t.transition(TaskState::Working, None);
        })
        .await;

    let requirements = PaymentRequirements::for_skill(skill).expect("priced skill always has requirements");
    match executor::execute(&state.config, &state.http_client, skill.id, &args).await {
        Ok(output) => match state.facilitator.verify_and_settle(&payload, &requirements) {
            Ok(transaction) => {
                state
                    .events
                    .append(Event::new(EventKind::PaymentSettled, task_id, skill.id, Some(wallet.clone()), Some(network.clone())))
                    .await;
                // Only record the wallet as paid once settlement actually succeeded —
                // recording it earlier would grant free future access to a wallet
                // whose payment later failed or was never settled.
                if !wallet.is_empty() {
                    state.sessions.record_payment(&wallet, skill.id).await;
                }
                let receipt = Receipt::success(transaction.clone(), network, wallet);
                let receipt_value = serde_json::to_value(&receipt).expect("receipt is always serializable");
                state
                    .tasks
                    .update(task_id, |t| {
                        t.metadata.insert("receipts".into(), json!([receipt_value]));
                        t.metadata.insert("transactionId".into(), json!(transaction));
                        t.set_payment_status(PaymentStatus::PaymentCompleted);
                        t.transition(TaskState::Completed, None);
                    })
                    .await;
                build_output_response(StatusCode::OK, &output, Some(&receipt))
            }
            Err(error) => paid_failure_response(state, task_id, &network, &wallet, error.to_string()).await,
        },
        Err(error) => paid_failure_response(state, task_id, &network, &wallet, error.to_string()).await,
    }
}

async fn paid_failure_response(state: &AppState, task_id: &str, network: &str, wallet: &str, reason: String) -> Response {
    let receipt = Receipt::failure(network.to_string(), wallet.to_string(), reason.clone());
    let receipt_value = serde_json::to_value(&receipt).expect("receipt is always serializable");
    state
        .tasks
        .update(task_id, |t| {
            t.metadata.insert("receipts".into(), json!([receipt_value]));
            t.set_payment_status(PaymentStatus::PaymentFailed);
            t.transition(TaskState::Failed, None);
        })
        .await;
    RestError::ExecutionFailed(reason).into_response()
}

fn build_output_response(status: StatusCode, output: &ExecutorOutput, receipt: Option<&Receipt>) -> Response {
    let mut response = if output.body.is_empty() {
        (status, Json(output.data.clone())).into_response()
    } else {
        let mut r = (status, output.body.clone()).into_response();
        if let Ok(content_type) = HeaderValue::from_str(output.content_type) {
            r.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        r
    };
    if let Some(receipt) = receipt {
        let body = json!({ "settled": receipt.success, "txHash": receipt.transaction }).to_string();
        if let Ok(value) = HeaderValue::from_str(&body) {
            response.headers_mut().insert("X-Payment-Response", value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::facilitator::TestModeFacilitator;
    use crate::state::snapshot::Snapshot;

    async fn test_state() -> AppState {
        AppState::new(Config::for_tests(), Arc::new(TestModeFacilitator), Snapshot::default()).await
    }

    #[tokio::test]
    async fn get_on_priced_skill_previews_requirements() {
        let response = payment_required_response(skill::by_id("screenshot").unwrap());
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn post_on_free_skill_renders_directly() {
        let state = test_state().await;
        let response = execute_and_respond(&state, skill::by_id("markdown-to-html").unwrap(), json!({ "markdown": "# Hi" }), None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_with_payment_settles_and_records_a_session() {
        let state = test_state().await;
        let payload = PaymentPayload {
            network: "eip155:8453".to_string(),
            scheme: "exact".to_string(),
            signature: Some("0xFF".to_string()),
            payload: None,
            from: "0xABC".to_string(),
        };
        let response = execute_and_respond(
            &state,
            skill::by_id("screenshot").unwrap(),
            json!({ "url": "https://example.com" }),
            Some(payload),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("X-Payment-Response").is_some());
        assert!(state.sessions.has_paid("0xabc", "screenshot").await);
    }

    #[test]
    fn missing_field_is_detected_per_skill() {
        let skill = skill::by_id("ai-analysis").unwrap();
        assert_eq!(missing_required_field(skill, &json!({})), Some("content"));
        assert_eq!(missing_required_field(skill, &json!({ "content": "hi" })), None);
    }

    #[test]
    fn rest_error_variants_map_to_the_documented_status_codes() {
        assert_eq!(RestError::UnknownSkill("x".into()).into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(RestError::MethodNotAllowed.into_response().status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(RestError::MalformedPaymentHeader.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(RestError::MissingField("url").into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(RestError::ExecutionFailed("boom".into()).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
