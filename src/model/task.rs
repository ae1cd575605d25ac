//! Task records and lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::message::{Message, PaymentStatus};

/// The task lifecycle state, per `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// Invariant 1: a task's state never regresses from a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Canceled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub state: TaskState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Task {
    pub fn new(id: String, context_id: String, message: Message) -> Self {
        let mut task = Task {
            id,
            context_id,
            status: TaskStatus {
                state: TaskState::Submitted,
                timestamp: Utc::now(),
                message: None,
            },
            payment_status: None,
            history: Vec::new(),
            artifacts: Vec::new(),
            metadata: Map::new(),
        };
        task.history.push(message);
        task
    }

    /// Applies a state transition, refusing to move a terminal task anywhere
    /// else (invariant 1). Returns `true` if the transition was applied.
    pub fn transition(&mut self, state: TaskState, message: Option<Message>) -> bool {
        if self.status.state.is_terminal() {
            return false;
        }
        self.status = TaskStatus {
            state,
            timestamp: Utc::now(),
            message: message.clone(),
        };
        if let Some(message) = message {
            self.history.push(message);
        }
        true
    }

    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{Part, Role};

    fn sample_message() -> Message {
        Message {
            message_id: "m1".into(),
            role: Role::User,
            kind: "message".into(),
            parts: vec![Part::Text { text: "hi".into() }],
            task_id: None,
            context_id: None,
            metadata: None,
        }
    }

    #[test]
    fn terminal_state_never_regresses() {
        let mut task = Task::new("t1".into(), "c1".into(), sample_message());
        assert!(task.transition(TaskState::Completed, None));
        assert!(!task.transition(TaskState::Working, None));
        assert_eq!(task.status.state, TaskState::Completed);
    }

    #[test]
    fn non_terminal_transitions_apply_and_append_history() {
        let mut task = Task::new("t1".into(), "c1".into(), sample_message());
        assert_eq!(task.history.len(), 1);
        assert!(task.transition(TaskState::InputRequired, Some(sample_message())));
        assert_eq!(task.history.len(), 2);
        assert_eq!(task.status.state, TaskState::InputRequired);
    }
}
