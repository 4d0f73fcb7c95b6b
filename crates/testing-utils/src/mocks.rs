//! Mock implementations of the component seam traits
//!
//! In-memory doubles for `WorkerDirectory`, `MessageSender` and `ConnectionProber`
//! so each component can be tested without constructing its neighbours.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordinator_core::{
    models::{OutgoingMessage, TaskRequirements, WorkerDescriptor, WorkerType},
    traits::{ConnectionProber, MessageSender, WorkerDirectory},
    CoordinatorError, CoordinatorResult,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Mock implementation of WorkerDirectory for testing
#[derive(Debug, Clone, Default)]
pub struct MockWorkerDirectory {
    workers: Arc<Mutex<Vec<WorkerDescriptor>>>,
}

impl MockWorkerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(workers: Vec<WorkerDescriptor>) -> Self {
        Self {
            workers: Arc::new(Mutex::new(workers)),
        }
    }

    pub fn add_worker(&self, worker: WorkerDescriptor) {
        self.workers.lock().unwrap().push(worker);
    }

    pub fn remove_worker(&self, worker_id: &str) {
        self.workers
            .lock()
            .unwrap()
            .retain(|w| w.worker_id != worker_id);
    }

    pub fn get_worker(&self, worker_id: &str) -> Option<WorkerDescriptor> {
        self.workers
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.worker_id == worker_id)
            .cloned()
    }
}

#[async_trait]
impl WorkerDirectory for MockWorkerDirectory {
    async fn is_registered(&self, worker_id: &str) -> bool {
        self.get_worker(worker_id).is_some()
    }

    async fn active_worker_ids(&self, exclude: Option<&str>) -> Vec<String> {
        self.workers
            .lock()
            .unwrap()
            .iter()
            .map(|w| w.worker_id.clone())
            .filter(|id| Some(id.as_str()) != exclude)
            .collect()
    }

    async fn worker_ids_by_type(&self, worker_type: WorkerType, available_only: bool) -> Vec<String> {
        self.workers
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.worker_type == worker_type)
            .filter(|w| !available_only || w.load_stats.is_available())
            .map(|w| w.worker_id.clone())
            .collect()
    }

    async fn worker_type(&self, worker_id: &str) -> Option<WorkerType> {
        self.get_worker(worker_id).map(|w| w.worker_type)
    }

    /// First available, non-excluded worker of the type wins
    async fn select_worker(
        &self,
        worker_type: WorkerType,
        requirements: &TaskRequirements,
    ) -> Option<WorkerDescriptor> {
        let mut workers = self.workers.lock().unwrap();
        let worker = workers.iter_mut().find(|w| {
            w.worker_type == worker_type
                && w.load_stats.is_available()
                && !requirements.is_excluded(&w.worker_id)
        })?;
        worker.load_stats.assign(Utc::now());
        Some(worker.clone())
    }

    async fn priority_rank(&self, worker_id: &str) -> Option<(f64, u64)> {
        self.get_worker(worker_id)
            .map(|w| (w.load_stats.priority_score, w.registration_seq))
    }
}

/// A message captured by [`MockMessageSender`]
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub from_worker_id: String,
    pub to_worker_id: String,
    pub message: OutgoingMessage,
}

/// Mock implementation of MessageSender for testing
///
/// Records every send. While `failing` is set, sends return `Err(Internal)`.
#[derive(Debug, Clone, Default)]
pub struct MockMessageSender {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<Mutex<usize>>,
    failing: Arc<Mutex<bool>>,
    rejecting: Arc<Mutex<bool>>,
}

impl MockMessageSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sender = Self::default();
        sender.set_failing(true);
        sender
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    /// Sends return `Err(InvalidWorkerIds)` while set
    pub fn set_rejecting(&self, rejecting: bool) {
        *self.rejecting.lock().unwrap() = rejecting;
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl MessageSender for MockMessageSender {
    async fn send_message(
        &self,
        from_worker_id: &str,
        to_worker_id: &str,
        message: OutgoingMessage,
    ) -> CoordinatorResult<bool> {
        *self.attempts.lock().unwrap() += 1;

        if *self.rejecting.lock().unwrap() {
            return Err(CoordinatorError::InvalidWorkerIds {
                from: from_worker_id.to_string(),
                to: to_worker_id.to_string(),
            });
        }
        if *self.failing.lock().unwrap() {
            return Err(CoordinatorError::Internal("模拟发送失败".to_string()));
        }

        self.sent.lock().unwrap().push(SentMessage {
            from_worker_id: from_worker_id.to_string(),
            to_worker_id: to_worker_id.to_string(),
            message,
        });
        Ok(true)
    }
}

/// Mock implementation of ConnectionProber for testing
#[derive(Debug, Clone, Default)]
pub struct MockConnectionProber {
    reachable: Arc<Mutex<HashSet<String>>>,
    probes: Arc<Mutex<Vec<String>>>,
}

impl MockConnectionProber {
    /// Every component unreachable until marked otherwise
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, component_id: &str, reachable: bool) {
        let mut set = self.reachable.lock().unwrap();
        if reachable {
            set.insert(component_id.to_string());
        } else {
            set.remove(component_id);
        }
    }

    pub fn probe_count(&self, component_id: &str) -> usize {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == component_id)
            .count()
    }
}

#[async_trait]
impl ConnectionProber for MockConnectionProber {
    async fn probe(&self, component_id: &str, _failed_at: DateTime<Utc>) -> bool {
        self.probes.lock().unwrap().push(component_id.to_string());
        self.reachable.lock().unwrap().contains(component_id)
    }
}
