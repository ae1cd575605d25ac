//! Server context: the single [`AppState`] threaded through every handler.
//!
//! Grounded on the teacher's `main.rs`, which builds one `Arc<FacilitatorLocal>`
//! in `main` and passes it into `Router::with_state`. Here the state is
//! wider — it bundles every store the gateway owns — but the shape (owned by
//! `main`, handed to handlers as `Arc<AppState>`, no global mutable statics)
//! is the same.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::config::Config;
use crate::facilitator::Facilitator;
use crate::state::{event_log::EventLog, session_store::SessionStore, snapshot::Snapshot, task_store::TaskStore};

pub struct AppState {
    pub config: Config,
    pub http_client: Client,
    pub facilitator: Arc<dyn Facilitator>,
    pub sessions: SessionStore,
    pub tasks: TaskStore,
    pub events: EventLog,
    pub started_at: DateTime<Utc>,
    /// Task ids currently running a paid-execution pass. Guards against a
    /// concurrent or correlated-resubmission re-entry into the same task's
    /// payment flow (`spec.md` §5). Only ever held briefly to insert/remove
    /// a task id — never across the executor call itself.
    payment_locks: Mutex<HashSet<String>>,
}

impl AppState {
    pub async fn new(config: Config, facilitator: Arc<dyn Facilitator>, snapshot: Snapshot) -> Self {
        let started_at = snapshot.started_at;
        let sessions = SessionStore::restore(snapshot.sessions).await;
        let tasks = TaskStore::restore(Default::default(), snapshot.total_tasks_created).await;
        let events = EventLog::restore(snapshot.events).await;
        AppState {
            config,
            http_client: Client::new(),
            facilitator,
            sessions,
            tasks,
            events,
            started_at,
            payment_locks: Mutex::new(HashSet::new()),
        }
    }

    /// Assembles a fresh snapshot from the current store contents, for
    /// periodic or shutdown-triggered persistence. `started_at` is the
    /// process epoch and carries forward unchanged; `saved_at` is stamped
    /// fresh.
    pub async fn snapshot(&self) -> Snapshot {
        Snapshot {
            events: self.events.snapshot().await,
            sessions: self.sessions.snapshot().await,
            total_tasks_created: self.tasks.total_created(),
            started_at: self.started_at,
            saved_at: Utc::now(),
        }
    }

    /// Claims exclusive right to run paid execution for `task_id`. Returns
    /// `None` if another request already holds the claim — a second
    /// correlated resubmission (or a genuinely concurrent request) arriving
    /// while the first is still in flight. The returned guard releases the
    /// claim when dropped, so every exit path — including an executor
    /// timeout — frees it.
    pub fn try_claim_payment<'a>(&'a self, task_id: &str) -> Option<PaymentClaim<'a>> {
        let mut locks = self.payment_locks.lock().expect("payment lock poisoned");
        if locks.insert(task_id.to_string()) {
            Some(PaymentClaim { state: self, task_id: task_id.to_string() })
        } else {
            None
        }
    }

    fn release_payment(&self, task_id: &str) {
        self.payment_locks.lock().expect("payment lock poisoned").remove(task_id);
    }
}

/// RAII handle on a task's payment claim. Held across the whole paid-execution
/// path, executor call included, without holding the underlying mutex for
/// any longer than the brief insert/remove that claims or releases it.
pub struct PaymentClaim<'a> {
    state: &'a AppState,
    task_id: String,
}

impl Drop for PaymentClaim<'_> {
    fn drop(&mut self) {
        self.state.release_payment(&self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facilitator::TestModeFacilitator;

    async fn test_state() -> AppState {
        AppState::new(crate::config::Config::for_tests(), Arc::new(TestModeFacilitator), Snapshot::default()).await
    }

    #[tokio::test]
    async fn a_task_id_can_only_be_claimed_once_at_a_time() {
        let state = test_state().await;
        let first = state.try_claim_payment("t1");
        assert!(first.is_some());
        assert!(state.try_claim_payment("t1").is_none());
        drop(first);
        assert!(state.try_claim_payment("t1").is_some());
    }

    #[tokio::test]
    async fn process_epoch_is_restored_from_a_loaded_snapshot() {
        let mut snapshot = Snapshot::default();
        snapshot.started_at = Utc::now() - chrono::Duration::days(3);
        let epoch = snapshot.started_at;
        let state = AppState::new(crate::config::Config::for_tests(), Arc::new(TestModeFacilitator), snapshot).await;
        assert_eq!(state.started_at, epoch);
    }
}
