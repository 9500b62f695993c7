//! Registry of running computations.
//!
//! A task is present from the moment it is accepted until it finishes or is
//! stopped. Removing it is the only cancellation signal: workers and the
//! orchestrator check for it before publishing progress.
//!
//! Ids may be reused once a task is gone, so a run holds a [`TaskTicket`]
//! naming the exact registration it belongs to. A run that outlives its
//! registration cannot touch a later task with the same id.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::solution::SolutionReport;

#[derive(Debug, Clone, Serialize)]
pub struct RunningTask {
    pub task_id: String,
    pub status_message: String,
    /// Units submitted but not finished yet.
    pub running_threads: usize,
    pub total_threads: usize,
    pub completed_threads: usize,
    pub failed_threads: usize,
    /// Number of piece orderings being tried.
    pub total_iterations: usize,
    pub current_best: Option<SolutionReport>,
}

impl RunningTask {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status_message: "Initializing...".to_string(),
            running_threads: 0,
            total_threads: 0,
            completed_threads: 0,
            failed_threads: 0,
            total_iterations: 0,
            current_best: None,
        }
    }
}

/// Proof of one registration of a task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTicket {
    task_id: String,
    generation: u64,
}

impl TaskTicket {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    task: RunningTask,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds `task` unless a task with the same id is already registered.
    pub fn register(&self, task: RunningTask) -> Option<TaskTicket> {
        let mut tasks = self.lock();
        if tasks.contains_key(&task.task_id) {
            return None;
        }
        let ticket = TaskTicket {
            task_id: task.task_id.clone(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        tasks.insert(
            task.task_id.clone(),
            Entry {
                generation: ticket.generation,
                task,
            },
        );
        Some(ticket)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.lock().contains_key(task_id)
    }

    /// Whether the registration behind `ticket` is still present.
    pub fn is_live(&self, ticket: &TaskTicket) -> bool {
        self.lock()
            .get(&ticket.task_id)
            .is_some_and(|e| e.generation == ticket.generation)
    }

    /// Snapshot of the task's current state.
    pub fn get(&self, task_id: &str) -> Option<RunningTask> {
        self.lock().get(task_id).map(|e| e.task.clone())
    }

    /// Applies `f` to the task if it is still registered.
    pub fn update<F>(&self, task_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut RunningTask),
    {
        match self.lock().get_mut(task_id) {
            Some(entry) => {
                f(&mut entry.task);
                true
            }
            None => false,
        }
    }

    /// Like [`update`](Self::update), restricted to the registration behind
    /// `ticket`.
    pub fn update_live<F>(&self, ticket: &TaskTicket, f: F) -> bool
    where
        F: FnOnce(&mut RunningTask),
    {
        match self.lock().get_mut(&ticket.task_id) {
            Some(entry) if entry.generation == ticket.generation => {
                f(&mut entry.task);
                true
            }
            _ => false,
        }
    }

    /// Returns whether the task was present. Removing twice is harmless.
    pub fn remove(&self, task_id: &str) -> bool {
        self.lock().remove(task_id).is_some()
    }

    /// Removes the registration behind `ticket`, leaving a newer task with
    /// the same id alone.
    pub fn release(&self, ticket: &TaskTicket) -> bool {
        let mut tasks = self.lock();
        match tasks.get(&ticket.task_id) {
            Some(e) if e.generation == ticket.generation => {
                tasks.remove(&ticket.task_id);
                true
            }
            _ => false,
        }
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
