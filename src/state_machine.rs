//! C7 — Payment State Machine.
//!
//! Central contract: one function, `handle`, that drives a task through
//! `submitted → input-required → completed|failed|canceled`, consulting the
//! session store for free re-access and the facilitator for settlement.
//! Every branch below corresponds to a numbered decision rule in
//! `spec.md` §4.6; the ordering of the `if`s is load-bearing in the same
//! way the parser's rule order is.

use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::executor::{self, ExecutorOutput};
use crate::facilitator::Facilitator;
use crate::model::event::{Event, EventKind};
use crate::model::message::{Message, Part, PaymentStatus, Role};
use crate::model::payment::{PaymentPayload, PaymentRequirements, Receipt};
use crate::model::skill::{self, Skill};
use crate::model::task::{Task, TaskState};
use crate::parser::{self, ParsedRequest};
use crate::state::context::AppState;

#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    #[error("message has no text part")]
    MissingTextPart,
}

/// Drives the payment lifecycle for an incoming message and returns the
/// resulting task. `state` plays the role of the dispatcher's rpc context:
/// every store the state machine touches hangs off it.
#[instrument(skip_all, fields(task_id = message.task_id.as_deref().unwrap_or("new")))]
pub async fn handle(state: &AppState, message: Message) -> Result<Task, StateMachineError> {
    let metadata = message.payment_metadata();

    if let Some(task_id) = message.task_id.clone() {
        if let Some(existing) = state.tasks.get(&task_id).await {
            if !existing.status.state.is_terminal() {
                if metadata.status == Some(PaymentStatus::PaymentRejected) {
                    return Ok(reject_task(state, &task_id, message).await);
                }
                let payload_attached = metadata.status == Some(PaymentStatus::PaymentSubmitted) || metadata.payload.is_some();
                if payload_attached {
                    return Ok(run_paid_execution(state, &task_id, metadata.payload).await);
                }
            } else {
                return Ok(existing);
            }
        }
    }

    let text = message.first_text().ok_or(StateMachineError::MissingTextPart)?;
    let parsed = parser::parse(text);
    let skill = skill::by_id(&parsed.skill_id).expect("parser only emits known skill ids");

    let task_id = Uuid::new_v4().to_string();
    let context_id = message.context_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut task = Task::new(task_id.clone(), context_id, message.clone());
    cache_parsed_request(&mut task, skill, &parsed);
    state.tasks.insert(task).await;

    let payload_attached = metadata.status == Some(PaymentStatus::PaymentSubmitted) || metadata.payload.is_some();
    if payload_attached {
        return Ok(run_paid_execution(state, &task_id, metadata.payload).await);
    }

    if let Some(wallet) = metadata.siwx_wallet.as_deref().filter(|w| !w.is_empty()) {
        if state.sessions.has_paid(wallet, &parsed.skill_id).await {
            state
                .events
                .append(Event::new(EventKind::SiwxAccess, &task_id, &parsed.skill_id, Some(wallet.to_string()), None))
                .await;
            return Ok(run_free_execution(state, &task_id).await);
        }
    }

    if skill.requires_payment() {
        return Ok(payment_required(state, &task_id, skill).await);
    }

    Ok(run_free_execution(state, &task_id).await)
}

fn cache_parsed_request(task: &mut Task, skill: &Skill, parsed: &ParsedRequest) {
    task.metadata.insert("skill".into(), Value::String(skill.id.to_string()));
    task.metadata.insert(
        "parsedRequest".into(),
        json!({ "skillId": parsed.skill_id, "args": parsed.args }),
    );
}

fn cached_parsed_request(task: &Task) -> Option<ParsedRequest> {
    let value = task.metadata.get("parsedRequest")?;
    Some(ParsedRequest {
        skill_id: value.get("skillId")?.as_str()?.to_string(),
        args: value.get("args")?.clone(),
    })
}

fn cached_skill(task: &Task) -> &'static Skill {
    let skill_id = task
        .metadata
        .get("skill")
        .and_then(Value::as_str)
        .expect("task was created with a cached skill id");
    skill::by_id(skill_id).expect("cached skill id is always known")
}

fn parsed_request_for(task: &Task) -> ParsedRequest {
    cached_parsed_request(task).unwrap_or_else(|| {
        let text = task.history.first().and_then(Message::first_text).unwrap_or_default();
        parser::parse(text)
    })
}

fn agent_message(task_id: &str, context_id: &str, parts: Vec<Part>, metadata: Option<Value>) -> Message {
    Message {
        message_id: Uuid::new_v4().to_string(),
        role: Role::Agent,
        kind: "message".to_string(),
        parts,
        task_id: Some(task_id.to_string()),
        context_id: Some(context_id.to_string()),
        metadata,
    }
}

async fn reject_task(state: &AppState, task_id: &str, incoming: Message) -> Task {
    let updated = state
        .tasks
        .update(task_id, |t| {
            t.set_payment_status(PaymentStatus::PaymentRejected);
            t.transition(TaskState::Canceled, Some(incoming.clone()));
        })
        .await
        .expect("task exists, checked by caller");
    let skill = cached_skill(&updated);
    state.events.append(Event::new(EventKind::PaymentRejected, task_id, skill.id, None, None)).await;
    warn!(task_id, skill = skill.id, "payment rejected, task canceled");
    updated
}

async fn payment_required(state: &AppState, task_id: &str, skill: &Skill) -> Task {
    let requirements = PaymentRequirements::for_skill(skill).expect("caller only invokes this for priced skills");
    let accepts = serde_json::to_value(&requirements.accepts).expect("accepts entries are always serializable");

    let updated = state
        .tasks
        .update(task_id, |t| {
            t.metadata.insert("accepts".into(), accepts.clone());
            t.set_payment_status(PaymentStatus::PaymentRequired);
            let message = agent_message(
                task_id,
                &t.context_id,
                vec![Part::Data {
                    data: json!({ "x402PaymentRequired": { "version": 1, "accepts": accepts } }),
                }],
                Some(json!({ "x402.payment.status": "payment-required" })),
            );
            t.transition(TaskState::InputRequired, Some(message));
        })
        .await
        .expect("task was just inserted by the caller");

    state.events.append(Event::new(EventKind::PaymentRequired, task_id, skill.id, None, None)).await;
    info!(task_id, skill = skill.id, "payment required, task waiting on input");
    updated
}

async fn run_free_execution(state: &AppState, task_id: &str) -> Task {
    let snapshot = state.tasks.get(task_id).await.expect("task exists, inserted by caller");
    let skill = cached_skill(&snapshot);
    let parsed = parsed_request_for(&snapshot);

    match executor::execute(&state.config, &state.http_client, skill.id, &parsed.args).await {
        Ok(output) => {
            let message = agent_message(task_id, &snapshot.context_id, result_parts(&output), None);
            state
                .tasks
                .update(task_id, |t| {
                    t.transition(TaskState::Completed, Some(message.clone()));
                })
                .await
                .expect("task still exists")
        }
        Err(error) => {
            let message = agent_message(task_id, &snapshot.context_id, vec![Part::Text { text: error.to_string() }], None);
            state
                .tasks
                .update(task_id, |t| {
                    t.transition(TaskState::Failed, Some(message.clone()));
                })
                .await
                .expect("task still exists")
        }
    }
}

/// Paid execution, for both a first-shot payment and a correlated
/// resubmission — the task is already in the store either way. Guarded by a
/// per-task claim so a second correlated resubmission arriving while the
/// first is still mid-flight cannot re-enter this path and double-settle.
async fn run_paid_execution(state: &AppState, task_id: &str, payload: Option<PaymentPayload>) -> Task {
    let Some(_claim) = state.try_claim_payment(task_id) else {
        return state.tasks.get(task_id).await.expect("task exists, checked by caller");
    };

    let snapshot = state.tasks.get(task_id).await.expect("task exists, checked by caller");
    let skill = cached_skill(&snapshot);
    let parsed = parsed_request_for(&snapshot);

    let Some(payload) = payload else {
        return fail_paid_task(state, task_id, "", "", "payment-submitted status without a payment payload".to_string()).await;
    };
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
    let execution = executor::execute(&state.config, &state.http_client, skill.id, &parsed.args).await;

    // The task may have been cancelled while the executor was in flight; a
    // cancelled task must never be resurrected by a late executor result.
    let current = state.tasks.get(task_id).await.expect("task still exists");
    if current.status.state == TaskState::Canceled {
        return current;
    }

    match execution {
        Ok(output) => match state.facilitator.verify_and_settle(&payload, &requirements) {
            Ok(transaction) => complete_paid_task(state, task_id, &wallet, &network, transaction, output).await,
            Err(error) => fail_paid_task(state, task_id, &wallet, &network, error.to_string()).await,
        },
        Err(error) => fail_paid_task(state, task_id, &wallet, &network, error.to_string()).await,
    }
}

async fn complete_paid_task(
    state: &AppState,
    task_id: &str,
    wallet: &str,
    network: &str,
    transaction: String,
    output: ExecutorOutput,
) -> Task {
    let skill = {
        let snapshot = state.tasks.get(task_id).await.expect("task still exists");
        cached_skill(&snapshot).id
    };
    state
        .events
        .append(Event::new(EventKind::PaymentSettled, task_id, skill, Some(wallet.to_string()), Some(network.to_string())))
        .await;

    // Only a genuinely settled payment entitles the wallet to free future
    // access (invariant: `session_store.has(w,s)` implies a `payment-settled`
    // event exists for `w`/`s`) — recording this any earlier would grant free
    // access to a wallet whose payment later failed or was never settled.
    if !wallet.is_empty() {
        state.sessions.record_payment(wallet, skill).await;
    }

    let receipt = Receipt::success(transaction.clone(), network.to_string(), wallet.to_string());
    let receipt_value = serde_json::to_value(&receipt).expect("receipt is always serializable");

    info!(task_id, %transaction, network, "payment settled, task completed");
    state
        .tasks
        .update(task_id, |t| {
            t.metadata.insert("receipts".into(), json!([receipt_value]));
            t.metadata.insert("transactionId".into(), json!(transaction));
            t.set_payment_status(PaymentStatus::PaymentCompleted);
            let message = agent_message(task_id, &t.context_id, result_parts(&output), None);
            t.transition(TaskState::Completed, Some(message));
        })
        .await
        .expect("task still exists")
}

async fn fail_paid_task(state: &AppState, task_id: &str, wallet: &str, network: &str, reason: String) -> Task {
    let receipt = Receipt::failure(network.to_string(), wallet.to_string(), reason.clone());
    let receipt_value = serde_json::to_value(&receipt).expect("receipt is always serializable");

    warn!(task_id, %reason, "paid task failed");
    state
        .tasks
        .update(task_id, |t| {
            t.metadata.insert("receipts".into(), json!([receipt_value]));
            t.set_payment_status(PaymentStatus::PaymentFailed);
            let message = agent_message(task_id, &t.context_id, vec![Part::Text { text: reason.clone() }], None);
            t.transition(TaskState::Failed, Some(message));
        })
        .await
        .expect("task exists")
}

fn result_parts(output: &ExecutorOutput) -> Vec<Part> {
    if output.content_type == "text/html" {
        if let Some(html) = output.data.get("html").and_then(Value::as_str) {
            return vec![Part::Data { data: json!({ "html": html }) }];
        }
    }
    vec![Part::Data { data: output.data.clone() }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::facilitator::TestModeFacilitator;
    use crate::state::context::AppState;
    use crate::state::snapshot::Snapshot;
    use std::sync::Arc;

    async fn test_state() -> AppState {
        AppState::new(Config::for_tests(), Arc::new(TestModeFacilitator), Snapshot::default()).await
    }

    fn text_message(text: &str) -> Message {
        Message {
            message_id: Uuid::new_v4().to_string(),
            role: Role::User,
            kind: "message".to_string(),
            parts: vec![Part::Text { text: text.to_string() }],
            task_id: None,
            context_id: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn free_skill_completes_with_no_payment_required_event() {
        let state = test_state().await;
        let task = handle(&state, text_message("# Hello")).await.unwrap();
        assert_eq!(task.status.state, TaskState::Completed);
        assert_eq!(state.events.len().await, 0);
    }

    #[tokio::test]
    async fn priced_skill_with_no_session_enters_input_required() {
        let state = test_state().await;
        let task = handle(&state, text_message("Take a screenshot of https://example.com")).await.unwrap();
        assert_eq!(task.status.state, TaskState::InputRequired);
        assert_eq!(task.payment_status, Some(PaymentStatus::PaymentRequired));
        assert_eq!(state.events.len().await, 1);
    }

    #[tokio::test]
    async fn standalone_flow_resubmission_completes_and_records_a_session() {
        let state = test_state().await;
        let first = handle(&state, text_message("Take a screenshot of https://example.com")).await.unwrap();

        let mut followup = text_message("Take a screenshot of https://example.com");
        followup.task_id = Some(first.id.clone());
        followup.metadata = Some(json!({
            "x402.payment.status": "payment-submitted",
            "x402.payment.payload": { "network": "eip155:8453", "from": "0xABC", "signature": "0xFF" },
        }));
        let second = handle(&state, followup).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.status.state, TaskState::Completed);
        assert_eq!(second.payment_status, Some(PaymentStatus::PaymentCompleted));
        assert!(state.sessions.has_paid("0xabc", "screenshot").await);
    }

    #[tokio::test]
    async fn a_rejected_settlement_never_records_the_wallet_as_paid() {
        let state = test_state().await;
        let first = handle(&state, text_message("Take a screenshot of https://example.com")).await.unwrap();

        let mut followup = text_message("Take a screenshot of https://example.com");
        followup.task_id = Some(first.id.clone());
        followup.metadata = Some(json!({
            "x402.payment.status": "payment-submitted",
            // network eip155:1 is not among screenshot's accepted networks,
            // so TestModeFacilitator::verify_and_settle rejects it.
            "x402.payment.payload": { "network": "eip155:1", "from": "0xDEF", "signature": "0xFF" },
        }));
        let second = handle(&state, followup).await.unwrap();

        assert_eq!(second.status.state, TaskState::Failed);
        assert_eq!(second.payment_status, Some(PaymentStatus::PaymentFailed));
        assert!(!state.sessions.has_paid("0xdef", "screenshot").await);
        assert!(!state.events.snapshot().await.iter().any(|e| e.kind == EventKind::PaymentSettled));
    }

    #[tokio::test]
    async fn a_second_concurrent_resubmission_cannot_double_settle() {
        let state = test_state().await;
        let first = handle(&state, text_message("Take a screenshot of https://example.com")).await.unwrap();

        let followup = |wallet: &str| {
            let mut message = text_message("ignored");
            message.task_id = Some(first.id.clone());
            message.metadata = Some(json!({
                "x402.payment.status": "payment-submitted",
                "x402.payment.payload": { "network": "eip155:8453", "from": wallet, "signature": "0xFF" },
            }));
            message
        };

        // Simulate a resubmission arriving while another is already claimed.
        let _claim = state.try_claim_payment(&first.id).unwrap();
        let blocked = handle(&state, followup("0xABC")).await.unwrap();
        assert_ne!(blocked.payment_status, Some(PaymentStatus::PaymentCompleted));
        drop(_claim);

        let settled = handle(&state, followup("0xABC")).await.unwrap();
        assert_eq!(settled.payment_status, Some(PaymentStatus::PaymentCompleted));

        let settled_events = state.events.snapshot().await.iter().filter(|e| e.kind == EventKind::PaymentSettled).count();
        assert_eq!(settled_events, 1);
    }

    #[tokio::test]
    async fn session_reuse_skips_payment_and_records_siwx_access() {
        let state = test_state().await;
        state.sessions.record_payment("0xabc", "screenshot").await;

        let mut message = text_message("Take a screenshot of https://example.com");
        message.metadata = Some(json!({ "x402.siwx.wallet": "0xABC" }));
        let task = handle(&state, message).await.unwrap();

        assert_ne!(task.status.state, TaskState::InputRequired);
        let events = state.events.snapshot().await;
        assert!(events.iter().any(|e| e.kind == EventKind::SiwxAccess));
    }

    #[tokio::test]
    async fn payment_rejection_cancels_the_task() {
        let state = test_state().await;
        let first = handle(&state, text_message("Take a screenshot of https://example.com")).await.unwrap();

        let mut followup = text_message("ignored");
        followup.task_id = Some(first.id.clone());
        followup.metadata = Some(json!({ "x402.payment.status": "payment-rejected" }));
        let second = handle(&state, followup).await.unwrap();

        assert_eq!(second.status.state, TaskState::Canceled);
    }

    #[tokio::test]
    async fn missing_text_part_is_an_error() {
        let state = test_state().await;
        let message = Message {
            message_id: Uuid::new_v4().to_string(),
            role: Role::User,
            kind: "message".to_string(),
            parts: vec![],
            task_id: None,
            context_id: None,
            metadata: None,
        };
        assert!(handle(&state, message).await.is_err());
    }
}
