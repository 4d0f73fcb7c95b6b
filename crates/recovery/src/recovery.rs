use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use coordinator_core::{
    config::RecoveryConfig,
    join_with_timeout,
    models::{
        ConnectionHealth, FailureRecord, FailureType, ImpactLevel, OutgoingMessage,
        RecoveryStrategy, TaskRequirements, WorkerType,
    },
    traits::{ConnectionProber, MessageSender, WorkerDirectory},
    ShutdownManager,
};

use crate::strategy::determine_strategy;

/// 资源锁，由资源冲突裁决产生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLock {
    pub resource_id: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// 等待重新分配的任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReassignment {
    pub task_id: String,
    pub worker_type: WorkerType,
    pub original_worker: String,
    pub failure_id: String,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RetryEntry {
    failure_id: String,
    from_worker: String,
    to_worker: String,
    message: OutgoingMessage,
    retry_count: u32,
    next_retry: DateTime<Utc>,
}

/// 恢复统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryStatistics {
    pub total_failures: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
    pub failures_by_type: HashMap<String, u64>,
    pub recoveries_by_strategy: HashMap<String, u64>,
}

/// 系统健康概览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall_health_percentage: f64,
    pub healthy_components: usize,
    pub total_components: usize,
    pub active_recoveries: usize,
    /// 最近一小时内的故障数
    pub recent_failures: usize,
    pub total_failures: usize,
    pub resolved_failures: usize,
    pub average_recovery_time_seconds: f64,
    pub pending_message_retries: usize,
    pub pending_reassignments: usize,
    pub unresolved_resource_conflicts: usize,
    pub statistics: RecoveryStatistics,
}

#[derive(Default)]
struct RecoveryState {
    failures: Vec<FailureRecord>,
    connection_health: HashMap<String, ConnectionHealth>,
    active_recoveries: HashSet<String>,
    message_retry_queue: Vec<RetryEntry>,
    resource_locks: HashMap<String, ResourceLock>,
    task_assignments: HashMap<String, String>,
    pending_reassignments: Vec<PendingReassignment>,
    statistics: RecoveryStatistics,
}

impl RecoveryState {
    fn failure_mut(&mut self, failure_id: &str) -> Option<&mut FailureRecord> {
        self.failures.iter_mut().find(|f| f.failure_id == failure_id)
    }

    fn health_mut(&mut self, component_id: &str, now: DateTime<Utc>) -> &mut ConnectionHealth {
        self.connection_health
            .entry(component_id.to_string())
            .or_insert_with(|| ConnectionHealth::new(component_id, now))
    }
}

/// 故障恢复系统
///
/// 负责检测和分类故障，并对连接故障、Worker崩溃、资源冲突和通信故障做出反应。
/// 内部有两个后台循环：恢复循环处理消息重试、过期资源锁和待重新分配的任务；
/// 心跳循环把长时间没有心跳的组件标记为不健康并合成连接故障。
///
/// 克隆开销很小，所有克隆共享同一份状态。
#[derive(Clone)]
pub struct ErrorRecoverySystem {
    config: RecoveryConfig,
    directory: Arc<dyn WorkerDirectory>,
    sender: Arc<dyn MessageSender>,
    prober: Arc<dyn ConnectionProber>,
    state: Arc<RwLock<RecoveryState>>,
    shutdown: ShutdownManager,
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
}

impl ErrorRecoverySystem {
    pub fn new(
        config: RecoveryConfig,
        directory: Arc<dyn WorkerDirectory>,
        sender: Arc<dyn MessageSender>,
        prober: Arc<dyn ConnectionProber>,
    ) -> Self {
        Self {
            config,
            directory,
            sender,
            prober,
            state: Arc::new(RwLock::new(RecoveryState::default())),
            shutdown: ShutdownManager::new(),
            handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 启动恢复循环和心跳循环
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            warn!("故障恢复系统已经启动");
            return;
        }

        let recovery_rx = self.shutdown.subscribe().await;
        let heartbeat_rx = self.shutdown.subscribe().await;
        handles.push(("recovery_loop", tokio::spawn(self.clone().recovery_loop(recovery_rx))));
        handles.push((
            "heartbeat_loop",
            tokio::spawn(self.clone().heartbeat_loop(heartbeat_rx)),
        ));
        info!("故障恢复系统已启动");
    }

    async fn recovery_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let tick = self.config.recovery_tick();
        info!("启动故障恢复循环，间隔: {:?}", tick);
        let mut ticker = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.process_message_retries().await;
                    self.cleanup_expired_locks().await;
                    self.process_pending_reassignments().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，退出故障恢复循环");
                    break;
                }
            }
        }
    }

    async fn heartbeat_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = self.config.heartbeat_interval();
        info!("启动心跳监控循环，间隔: {:?}", interval);
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_component_health().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，退出心跳监控循环");
                    break;
                }
            }
        }
    }

    /// 处理连接故障
    ///
    /// 返回是否启动了自动恢复。策略为Escalate或Abort时返回 `false`。
    pub async fn handle_connection_failure(
        &self,
        component_id: &str,
        error: &str,
        context: HashMap<String, Value>,
    ) -> bool {
        let now = Utc::now();
        let mut context = context;
        context.insert("error".to_string(), json!(error));

        let (failure_id, occurred_at, strategy) = {
            let mut state = self.state.write().await;
            let (failure_id, strategy) = self.create_failure_record(
                &mut state,
                FailureType::ConnectionFailure,
                component_id,
                format!("连接失败: {}", error),
                context,
            );
            state.health_mut(component_id, now).record_failure();
            match strategy {
                RecoveryStrategy::Retry => {
                    state
                        .active_recoveries
                        .insert(format!("conn_recovery_{}_{}", component_id, failure_id));
                }
                RecoveryStrategy::Escalate => self.escalate(&mut state, &failure_id),
                _ => {}
            }
            (failure_id, now, strategy)
        };

        match strategy {
            RecoveryStrategy::Retry => {
                let shutdown_rx = self.shutdown.subscribe().await;
                let system = self.clone();
                let component = component_id.to_string();
                tokio::spawn(async move {
                    system
                        .connection_recovery(component, failure_id, occurred_at, shutdown_rx)
                        .await;
                });
                true
            }
            RecoveryStrategy::Escalate => false,
            other => {
                warn!(
                    "组件 {} 故障过于频繁，放弃自动恢复 (策略: {})",
                    component_id,
                    other.as_str()
                );
                false
            }
        }
    }

    /// 指数退避的连接恢复
    async fn connection_recovery(
        &self,
        component_id: String,
        failure_id: String,
        failed_at: DateTime<Utc>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let recovery_id = format!("conn_recovery_{}_{}", component_id, failure_id);
        let mut attempt = 0;
        let mut recovered = false;
        let mut cancelled = false;

        while attempt < self.config.max_retry_attempts {
            attempt += 1;
            let delay = self.config.backoff_delay(attempt);
            debug!(
                "组件 {} 第 {} 次连接恢复将在 {:?} 后进行",
                component_id, attempt, delay
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    cancelled = true;
                    break;
                }
            }

            if self.heartbeat_since(&component_id, failed_at).await
                || self.prober.probe(&component_id, failed_at).await
            {
                recovered = true;
                break;
            }

            let mut state = self.state.write().await;
            if let Some(record) = state.failure_mut(&failure_id) {
                record.recovery_attempts = attempt;
            }
        }

        let mut state = self.state.write().await;
        state.active_recoveries.remove(&recovery_id);
        if cancelled {
            debug!("组件 {} 的连接恢复因关闭而中止", component_id);
            return;
        }

        let now = Utc::now();
        if let Some(record) = state.failure_mut(&failure_id) {
            record.recovery_attempts = attempt;
            if recovered {
                record.resolve(now);
            }
        }

        if recovered {
            state.health_mut(&component_id, now).record_success(0.0, now);
            state.statistics.successful_recoveries += 1;
            metrics::counter!("coordinator_recoveries_total", "outcome" => "success").increment(1);
            info!("组件 {} 连接恢复成功，尝试次数: {}", component_id, attempt);
        } else {
            state.statistics.failed_recoveries += 1;
            metrics::counter!("coordinator_recoveries_total", "outcome" => "failure").increment(1);
            warn!("组件 {} 连接恢复失败，已尝试 {} 次", component_id, attempt);
        }
    }

    async fn heartbeat_since(&self, component_id: &str, since: DateTime<Utc>) -> bool {
        let state = self.state.read().await;
        state
            .connection_health
            .get(component_id)
            .map(|h| h.is_healthy && h.last_heartbeat > since)
            .unwrap_or(false)
    }

    /// 处理Worker崩溃，把任务重新分配给同类型的其他Worker
    ///
    /// 找不到替代Worker的任务进入待重新分配队列，由恢复循环稍后重试。
    pub async fn handle_worker_crash(
        &self,
        worker_id: &str,
        task_ids: &[String],
        context: HashMap<String, Value>,
    ) -> bool {
        let now = Utc::now();
        let mut context = context;
        context.insert("active_tasks".to_string(), json!(task_ids));

        let failure_id = {
            let mut state = self.state.write().await;
            let (failure_id, strategy) = self.create_failure_record(
                &mut state,
                FailureType::WorkerCrash,
                worker_id,
                format!("Worker崩溃，在途任务 {} 个", task_ids.len()),
                context,
            );
            state.health_mut(worker_id, now).record_failure();
            if strategy == RecoveryStrategy::Escalate {
                self.escalate(&mut state, &failure_id);
            }
            failure_id
        };

        let Some(worker_type) = self.directory.worker_type(worker_id).await else {
            warn!("无法确定崩溃Worker {} 的类型，任务无法重新分配", worker_id);
            return true;
        };

        let requirements = TaskRequirements::new().excluding(worker_id);
        let mut assigned = Vec::new();
        let mut queued = Vec::new();
        for task_id in task_ids {
            match self.directory.select_worker(worker_type, &requirements).await {
                Some(worker) => {
                    info!(
                        "任务 {} 已从 {} 重新分配给 {}",
                        task_id, worker_id, worker.worker_id
                    );
                    assigned.push((task_id.clone(), worker.worker_id));
                }
                None => queued.push(PendingReassignment {
                    task_id: task_id.clone(),
                    worker_type,
                    original_worker: worker_id.to_string(),
                    failure_id: failure_id.clone(),
                    queued_at: now,
                }),
            }
        }

        let reassigned = assigned.len();
        let mut state = self.state.write().await;
        state.task_assignments.extend(assigned);
        for pending in queued {
            state.pending_reassignments.retain(|p| p.task_id != pending.task_id);
            state.pending_reassignments.push(pending);
        }
        if let Some(record) = state.failure_mut(&failure_id) {
            record
                .context
                .insert("reassigned_tasks".to_string(), json!(reassigned));
        }
        metrics::counter!("coordinator_tasks_reassigned_total").increment(reassigned as u64);

        info!(
            "Worker崩溃已处理: {}，立即重新分配 {} 个任务，待分配 {} 个",
            worker_id,
            reassigned,
            task_ids.len() - reassigned
        );
        true
    }

    /// 资源冲突裁决：授予优先级评分最高的Worker，同分按注册顺序
    pub async fn handle_resource_conflict(
        &self,
        resource_id: &str,
        worker_ids: &[String],
        context: HashMap<String, Value>,
    ) -> bool {
        let mut context = context;
        context.insert("conflicting_workers".to_string(), json!(worker_ids));

        let failure_id = {
            let mut state = self.state.write().await;
            let (failure_id, _) = self.create_failure_record(
                &mut state,
                FailureType::ResourceConflict,
                resource_id,
                format!("{} 个Worker争用资源", worker_ids.len()),
                context,
            );
            failure_id
        };

        if worker_ids.is_empty() {
            warn!("资源 {} 的冲突中没有候选Worker", resource_id);
            return false;
        }

        let mut ranked = Vec::with_capacity(worker_ids.len());
        for worker_id in worker_ids {
            ranked.push((worker_id, self.directory.priority_rank(worker_id).await));
        }
        // 未知Worker排在最后，稳定排序保持输入顺序
        ranked.sort_by(|(_, a), (_, b)| match (a, b) {
            (Some((pa, sa)), Some((pb, sb))) => pb.total_cmp(pa).then(sa.cmp(sb)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        let winner = ranked[0].0.clone();

        let now = Utc::now();
        let mut state = self.state.write().await;
        state.resource_locks.insert(
            resource_id.to_string(),
            ResourceLock {
                resource_id: resource_id.to_string(),
                holder: winner.clone(),
                acquired_at: now,
                expires_at: now + ChronoDuration::seconds(self.config.lock_timeout_seconds),
            },
        );
        if let Some(record) = state.failure_mut(&failure_id) {
            record.resolve(now);
        }
        info!("资源 {} 已授予Worker {}", resource_id, winner);
        true
    }

    /// 通信故障：消息进入重试队列，按指数退避重发
    pub async fn handle_communication_failure(
        &self,
        from_worker_id: &str,
        to_worker_id: &str,
        message: OutgoingMessage,
        error: &str,
    ) -> bool {
        let now = Utc::now();
        let component = format!("{}->{}", from_worker_id, to_worker_id);
        let context = HashMap::from([
            ("from_worker".to_string(), json!(from_worker_id)),
            ("to_worker".to_string(), json!(to_worker_id)),
            ("message_type".to_string(), json!(message.message_type.as_str())),
            ("error".to_string(), json!(error)),
        ]);

        let mut state = self.state.write().await;
        let (failure_id, strategy) = self.create_failure_record(
            &mut state,
            FailureType::CommunicationFailure,
            &component,
            format!("消息投递失败: {}", error),
            context,
        );
        if strategy == RecoveryStrategy::Escalate {
            self.escalate(&mut state, &failure_id);
            return false;
        }

        state.message_retry_queue.push(RetryEntry {
            failure_id,
            from_worker: from_worker_id.to_string(),
            to_worker: to_worker_id.to_string(),
            message,
            retry_count: 0,
            next_retry: now + self.chrono_delay(1),
        });
        info!("通信故障已加入重试队列: {}", component);
        true
    }

    /// 记录组件心跳
    pub async fn record_heartbeat(&self, component_id: &str, response_time_ms: f64) {
        let now = Utc::now();
        let mut state = self.state.write().await;
        state
            .health_mut(component_id, now)
            .record_success(response_time_ms, now);
    }

    /// 重发到期的消息，返回成功重发的数量
    ///
    /// 路由器接收即视为交付完成：未能立即投递的副本由路由器自己重试，
    /// 这里不再重复发送。只有发送返回错误时才计入重试次数。
    pub async fn process_message_retries(&self) -> usize {
        let now = Utc::now();
        let due: Vec<RetryEntry> = {
            let mut state = self.state.write().await;
            let (due, waiting) = std::mem::take(&mut state.message_retry_queue)
                .into_iter()
                .partition(|entry| entry.next_retry <= now);
            state.message_retry_queue = waiting;
            due
        };
        if due.is_empty() {
            return 0;
        }

        let mut sent = Vec::new();
        let mut failed = Vec::new();
        for mut entry in due {
            let accepted = match self
                .sender
                .send_message(&entry.from_worker, &entry.to_worker, entry.message.clone())
                .await
            {
                Ok(delivered) => {
                    if !delivered {
                        debug!("消息 {} 已重新入队，等待路由器投递", entry.failure_id);
                    }
                    true
                }
                Err(e) => {
                    debug!("消息重发出错 {}: {}", entry.failure_id, e);
                    false
                }
            };

            if accepted {
                sent.push(entry.failure_id);
            } else {
                entry.retry_count += 1;
                failed.push(entry);
            }
        }

        let succeeded = sent.len();
        let now = Utc::now();
        let mut state = self.state.write().await;
        for failure_id in sent {
            if let Some(record) = state.failure_mut(&failure_id) {
                record.recovery_attempts += 1;
                record.resolve(now);
            }
            state.statistics.successful_recoveries += 1;
            metrics::counter!("coordinator_recoveries_total", "outcome" => "success").increment(1);
            debug!("消息重发成功: {}", failure_id);
        }
        for mut entry in failed {
            if let Some(record) = state.failure_mut(&entry.failure_id) {
                record.recovery_attempts = entry.retry_count;
            }
            if entry.retry_count < self.config.max_retry_attempts {
                entry.next_retry = now + self.chrono_delay(entry.retry_count + 1);
                state.message_retry_queue.push(entry);
            } else {
                state.statistics.failed_recoveries += 1;
                metrics::counter!("coordinator_recoveries_total", "outcome" => "failure").increment(1);
                warn!(
                    "消息 {} -> {} 重试 {} 次后放弃: {}",
                    entry.from_worker, entry.to_worker, entry.retry_count, entry.failure_id
                );
            }
        }
        succeeded
    }

    /// 清理过期的资源锁
    pub async fn cleanup_expired_locks(&self) -> usize {
        self.cleanup_expired_locks_at(Utc::now()).await
    }

    async fn cleanup_expired_locks_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        let before = state.resource_locks.len();
        state.resource_locks.retain(|resource_id, lock| {
            let alive = lock.expires_at > now;
            if !alive {
                info!("资源锁已过期: {} (持有者: {})", resource_id, lock.holder);
            }
            alive
        });
        before - state.resource_locks.len()
    }

    /// 重试待重新分配的任务，返回本次分配成功的数量
    ///
    /// 排队超过 `reassignment_timeout_minutes` 的任务被放弃并计为恢复失败。
    pub async fn process_pending_reassignments(&self) -> usize {
        self.process_pending_reassignments_at(Utc::now()).await
    }

    async fn process_pending_reassignments_at(&self, now: DateTime<Utc>) -> usize {
        let pending = {
            let mut state = self.state.write().await;
            self.drop_stale_reassignments(&mut state, now);
            state.pending_reassignments.clone()
        };
        if pending.is_empty() {
            return 0;
        }

        let mut assigned = Vec::new();
        for task in pending {
            let requirements = TaskRequirements::new().excluding(task.original_worker.as_str());
            if let Some(worker) = self
                .directory
                .select_worker(task.worker_type, &requirements)
                .await
            {
                info!("排队任务 {} 已重新分配给 {}", task.task_id, worker.worker_id);
                assigned.push((task.task_id, worker.worker_id));
            }
        }

        let count = assigned.len();
        let mut state = self.state.write().await;
        for (task_id, worker_id) in assigned {
            state.pending_reassignments.retain(|p| p.task_id != task_id);
            state.task_assignments.insert(task_id, worker_id);
        }
        metrics::counter!("coordinator_tasks_reassigned_total").increment(count as u64);
        count
    }

    /// 检查组件心跳，返回本次新标记为不健康的组件
    pub async fn check_component_health(&self) -> Vec<String> {
        self.check_component_health_at(Utc::now()).await
    }

    async fn check_component_health_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let threshold = ChronoDuration::seconds(self.config.heartbeat_interval_seconds as i64 * 2);
        let dedup_since = now - ChronoDuration::minutes(self.config.heartbeat_failure_dedup_minutes);

        let (flagged, to_report) = {
            let mut state = self.state.write().await;
            let silent: Vec<String> = state
                .connection_health
                .values()
                .filter(|h| h.is_healthy && now - h.last_heartbeat > threshold)
                .map(|h| h.component_id.clone())
                .collect();

            let mut to_report = Vec::new();
            for component_id in &silent {
                warn!("组件 {} 心跳超时，标记为不健康", component_id);
                let recently_reported = state.failures.iter().any(|f| {
                    f.component == *component_id
                        && f.failure_type == FailureType::ConnectionFailure
                        && f.occurred_at > dedup_since
                });
                if recently_reported {
                    state.health_mut(component_id, now).record_failure();
                } else {
                    to_report.push(component_id.clone());
                }
            }
            (silent, to_report)
        };

        for component_id in to_report {
            let context = HashMap::from([("reason".to_string(), json!("heartbeat_timeout"))]);
            self.handle_connection_failure(&component_id, "心跳超时", context)
                .await;
        }
        flagged
    }

    pub async fn get_system_health(&self) -> SystemHealth {
        let now = Utc::now();
        let state = self.state.read().await;

        let total_components = state.connection_health.len();
        let healthy_components = state
            .connection_health
            .values()
            .filter(|h| h.is_healthy)
            .count();
        let overall_health_percentage = if total_components > 0 {
            healthy_components as f64 / total_components as f64 * 100.0
        } else {
            100.0
        };

        let hour_ago = now - ChronoDuration::hours(1);
        let recent_failures = state
            .failures
            .iter()
            .filter(|f| f.occurred_at > hour_ago)
            .count();
        let durations: Vec<f64> = state
            .failures
            .iter()
            .filter(|f| f.is_resolved)
            .filter_map(|f| f.resolution_seconds())
            .collect();
        let average_recovery_time_seconds = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        SystemHealth {
            overall_health_percentage,
            healthy_components,
            total_components,
            active_recoveries: state.active_recoveries.len(),
            recent_failures,
            total_failures: state.failures.len(),
            resolved_failures: durations.len(),
            average_recovery_time_seconds,
            pending_message_retries: state.message_retry_queue.len(),
            pending_reassignments: state.pending_reassignments.len(),
            unresolved_resource_conflicts: state
                .failures
                .iter()
                .filter(|f| f.failure_type == FailureType::ResourceConflict && !f.is_resolved)
                .count(),
            statistics: state.statistics.clone(),
        }
    }

    /// 最近的故障记录，最新的在前
    pub async fn get_failure_history(&self, limit: usize) -> Vec<FailureRecord> {
        let state = self.state.read().await;
        state.failures.iter().rev().take(limit).cloned().collect()
    }

    pub async fn connection_health(&self, component_id: &str) -> Option<ConnectionHealth> {
        self.state
            .read()
            .await
            .connection_health
            .get(component_id)
            .cloned()
    }

    pub async fn task_assignment(&self, task_id: &str) -> Option<String> {
        self.state.read().await.task_assignments.get(task_id).cloned()
    }

    pub async fn pending_reassignments(&self) -> Vec<PendingReassignment> {
        self.state.read().await.pending_reassignments.clone()
    }

    /// 资源当前的持有者，锁过期后返回 `None`
    pub async fn resource_holder(&self, resource_id: &str) -> Option<String> {
        let now = Utc::now();
        self.state
            .read()
            .await
            .resource_locks
            .get(resource_id)
            .filter(|lock| lock.expires_at > now)
            .map(|lock| lock.holder.clone())
    }

    pub async fn get_recovery_statistics(&self) -> RecoveryStatistics {
        self.state.read().await.statistics.clone()
    }

    /// 停止后台循环并清空所有表
    pub async fn shutdown(&self) {
        info!("关闭故障恢复系统...");
        self.shutdown.shutdown().await;

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for (name, handle) in handles {
            join_with_timeout(name, handle, self.config.shutdown_timeout()).await;
        }

        let mut state = self.state.write().await;
        *state = RecoveryState::default();
        info!("故障恢复系统已关闭");
    }

    fn create_failure_record(
        &self,
        state: &mut RecoveryState,
        failure_type: FailureType,
        component: &str,
        description: String,
        context: HashMap<String, Value>,
    ) -> (String, RecoveryStrategy) {
        let mut record = FailureRecord::new(
            failure_type,
            component,
            description,
            context,
            self.config.max_retry_attempts,
        );
        let window_start =
            record.occurred_at - ChronoDuration::minutes(self.config.strategy_window_minutes);
        // 统计包含本次故障
        let recent = 1 + state
            .failures
            .iter()
            .filter(|f| f.component == component && f.occurred_at > window_start)
            .count();
        let strategy = determine_strategy(failure_type, recent);
        record.recovery_strategy = Some(strategy);

        let stats = &mut state.statistics;
        stats.total_failures += 1;
        *stats
            .failures_by_type
            .entry(failure_type.as_str().to_string())
            .or_insert(0) += 1;
        *stats
            .recoveries_by_strategy
            .entry(strategy.as_str().to_string())
            .or_insert(0) += 1;
        metrics::counter!("coordinator_failures_total", "failure_type" => failure_type.as_str())
            .increment(1);

        warn!(
            "记录故障 {}: 类型={}, 组件={}, 策略={}, 窗口内次数={}",
            record.failure_id,
            failure_type.as_str(),
            component,
            strategy.as_str(),
            recent
        );
        let failure_id = record.failure_id.clone();
        state.failures.push(record);
        (failure_id, strategy)
    }

    fn escalate(&self, state: &mut RecoveryState, failure_id: &str) {
        let Some(record) = state.failure_mut(failure_id) else {
            return;
        };
        record.impact_level = ImpactLevel::Critical;
        error!(
            "故障升级，需要人工介入: {} (故障ID: {}, 组件: {}, 上下文: {:?})",
            record.description, record.failure_id, record.component, record.context
        );
        metrics::counter!("coordinator_recoveries_total", "outcome" => "escalated").increment(1);
    }

    fn drop_stale_reassignments(&self, state: &mut RecoveryState, now: DateTime<Utc>) {
        let Some(cutoff) = ChronoDuration::try_minutes(self.config.reassignment_timeout_minutes)
            .and_then(|ttl| now.checked_sub_signed(ttl))
        else {
            return;
        };
        let (stale, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending_reassignments)
            .into_iter()
            .partition(|task| task.queued_at <= cutoff);
        state.pending_reassignments = waiting;

        for task in stale {
            state.statistics.failed_recoveries += 1;
            metrics::counter!("coordinator_recoveries_total", "outcome" => "failure").increment(1);
            warn!(
                "任务 {} 等待重新分配超过 {} 分钟，放弃 (原Worker: {}, 故障: {})",
                task.task_id,
                self.config.reassignment_timeout_minutes,
                task.original_worker,
                task.failure_id
            );
        }
    }

    /// 第 `attempt` 次重发的退避延迟
    fn chrono_delay(&self, attempt: u32) -> ChronoDuration {
        ChronoDuration::from_std(self.config.backoff_delay(attempt))
            .unwrap_or_else(|_| ChronoDuration::milliseconds(self.config.retry_delay_base_ms as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_testing_utils::{
        MockConnectionProber, MockMessageSender, MockWorkerDirectory, WorkerDescriptorBuilder,
    };

    fn system(directory: MockWorkerDirectory) -> ErrorRecoverySystem {
        ErrorRecoverySystem::new(
            RecoveryConfig::default(),
            Arc::new(directory),
            Arc::new(MockMessageSender::new()),
            Arc::new(MockConnectionProber::new()),
        )
    }

    #[tokio::test]
    async fn test_resource_lock_expiry() {
        let directory = MockWorkerDirectory::new();
        directory.add_worker(WorkerDescriptorBuilder::new("e1", WorkerType::Executor).build());
        let recovery = system(directory);

        assert!(
            recovery
                .handle_resource_conflict("db", &["e1".to_string()], HashMap::new())
                .await
        );
        assert_eq!(recovery.cleanup_expired_locks().await, 0);
        assert_eq!(recovery.resource_holder("db").await.as_deref(), Some("e1"));

        let later = Utc::now() + ChronoDuration::minutes(11);
        assert_eq!(recovery.cleanup_expired_locks_at(later).await, 1);
        assert!(recovery.resource_holder("db").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_pending_reassignment_is_dropped() {
        let directory = MockWorkerDirectory::new();
        directory.add_worker(
            WorkerDescriptorBuilder::new("v1", WorkerType::Verifier)
                .with_seq(0)
                .build(),
        );
        let recovery = system(directory);

        assert!(
            recovery
                .handle_worker_crash("v1", &["t1".to_string()], HashMap::new())
                .await
        );
        assert_eq!(recovery.pending_reassignments().await.len(), 1);

        // 时限之内继续排队
        assert_eq!(recovery.process_pending_reassignments().await, 0);
        assert_eq!(recovery.pending_reassignments().await.len(), 1);

        let later = Utc::now() + ChronoDuration::minutes(31);
        assert_eq!(recovery.process_pending_reassignments_at(later).await, 0);
        assert!(recovery.pending_reassignments().await.is_empty());
        assert_eq!(recovery.get_recovery_statistics().await.failed_recoveries, 1);
        assert!(recovery.task_assignment("t1").await.is_none());
    }

    #[tokio::test]
    async fn test_silent_component_synthesizes_connection_failure_once() {
        let recovery = system(MockWorkerDirectory::new());
        recovery.record_heartbeat("e1", 12.0).await;

        assert!(recovery.check_component_health().await.is_empty());

        let later = Utc::now() + ChronoDuration::seconds(61);
        assert_eq!(recovery.check_component_health_at(later).await, vec!["e1"]);
        let history = recovery.get_failure_history(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].failure_type, FailureType::ConnectionFailure);
        assert_eq!(history[0].context["reason"], json!("heartbeat_timeout"));

        // 已不健康的组件不会被重复标记
        assert!(recovery.check_component_health_at(later).await.is_empty());

        // 恢复心跳后再次沉默，去重窗口内不再合成故障
        recovery.record_heartbeat("e1", 12.0).await;
        assert_eq!(recovery.check_component_health_at(later).await, vec!["e1"]);
        assert_eq!(recovery.get_failure_history(10).await.len(), 1);
        assert!(!recovery.connection_health("e1").await.unwrap().is_healthy);
    }
}
