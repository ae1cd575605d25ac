//! C4 — Task Store.
//!
//! Owns every `Task` the gateway has created, keyed by task id, plus the
//! monotonic counter `spec.md` §8 uses to describe "total tasks created".
//! Updates go through [`Task::transition`], which already refuses to move a
//! terminal task (invariant 1) — this store adds nothing on top of that but
//! the locking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use crate::model::task::Task;

#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<String, Task>>,
    total_created: AtomicU64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn restore(tasks: HashMap<String, Task>, total_created: u64) -> Self {
        TaskStore {
            tasks: RwLock::new(tasks),
            total_created: AtomicU64::new(total_created),
        }
    }

    pub async fn insert(&self, task: Task) {
        self.total_created.fetch_add(1, Ordering::Relaxed);
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// Applies `update` to the stored task, if present, persisting whatever
    /// mutation it made regardless of whether the transition itself was
    /// accepted (the task is read back by the caller to check that).
    pub async fn update<F>(&self, task_id: &str, update: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(task_id)?;
        update(task);
        Some(task.clone())
    }

    pub fn total_created(&self) -> u64 {
        self.total_created.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> HashMap<String, Task> {
        self.tasks.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{Message, Part, Role};
    use crate::model::task::TaskState;

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

    #[tokio::test]
    async fn insert_and_get_round_trips_and_counts() {
        let store = TaskStore::new();
        store.insert(Task::new("t1".into(), "c1".into(), sample_message())).await;
        assert!(store.get("t1").await.is_some());
        assert_eq!(store.total_created(), 1);
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn update_mutates_the_stored_task_in_place() {
        let store = TaskStore::new();
        store.insert(Task::new("t1".into(), "c1".into(), sample_message())).await;
        let updated = store
            .update("t1", |task| {
                task.transition(TaskState::Completed, None);
            })
            .await
            .unwrap();
        assert_eq!(updated.status.state, TaskState::Completed);
        let reread = store.get("t1").await.unwrap();
        assert_eq!(reread.status.state, TaskState::Completed);
    }
}
