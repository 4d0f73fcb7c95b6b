use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use coordinator_core::{
    config::RouterConfig,
    models::{
        CollaborativeMessage, DeliveryStatus, MessageDeliveryRecord, MessageType, OutgoingMessage,
        WorkerType,
    },
    traits::{MessageSender, WorkerDirectory},
    CoordinatorError, CoordinatorResult, ShutdownManager,
};

use crate::queue::PriorityQueue;

/// 消息订阅回调，在路由器锁之外调用
pub type MessageCallback = Arc<dyn Fn(&CollaborativeMessage) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct RoutingCounters {
    total_messages: u64,
    successful_deliveries: u64,
    failed_deliveries: u64,
    expired_messages: u64,
    messages_by_type: HashMap<String, u64>,
    messages_by_priority: HashMap<String, u64>,
    total_delivery_time_ms: f64,
}

#[derive(Default)]
struct RouterState {
    queues: HashMap<String, PriorityQueue>,
    pending: HashMap<String, CollaborativeMessage>,
    /// 正在调用订阅回调的消息，过期清理跳过它们
    in_flight: HashSet<String>,
    subscribers: HashMap<String, Vec<MessageCallback>>,
    history: Vec<CollaborativeMessage>,
    delivery_records: Vec<MessageDeliveryRecord>,
    counters: RoutingCounters,
}

/// 路由统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingStatistics {
    pub total_messages: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
    pub expired_messages: u64,
    pub messages_by_type: HashMap<String, u64>,
    pub messages_by_priority: HashMap<String, u64>,
    pub average_delivery_time_ms: f64,
    pub pending_messages: usize,
    pub delivery_records: usize,
    pub active_subscriptions: usize,
    pub history_size: usize,
}

enum DeliveryAttempt {
    Rejected,
    Ready {
        message: CollaborativeMessage,
        callbacks: Vec<MessageCallback>,
    },
}

/// 协作消息路由器
///
/// 为每个接收者维护有界优先级队列，负责投递、重试、过期清理和订阅分发。
pub struct MessageRouter {
    config: RouterConfig,
    directory: Arc<dyn WorkerDirectory>,
    state: RwLock<RouterState>,
    /// 串行化投递过程，保证同一接收者同优先级消息的顺序
    delivery_lock: Mutex<()>,
}

impl MessageRouter {
    pub fn new(config: RouterConfig, directory: Arc<dyn WorkerDirectory>) -> Self {
        Self {
            config,
            directory,
            state: RwLock::new(RouterState::default()),
            delivery_lock: Mutex::new(()),
        }
    }

    /// 路由一条消息
    ///
    /// 发送方和接收方都必须是已注册的Worker。启用立即投递时返回该消息是否已送达，
    /// 否则入队成功即返回 true。
    pub async fn route_message(
        &self,
        from_worker_id: &str,
        to_worker_id: &str,
        message: OutgoingMessage,
    ) -> CoordinatorResult<bool> {
        if !self.directory.is_registered(from_worker_id).await
            || !self.directory.is_registered(to_worker_id).await
        {
            warn!("无效的Worker ID: {} -> {}", from_worker_id, to_worker_id);
            return Err(CoordinatorError::InvalidWorkerIds {
                from: from_worker_id.to_string(),
                to: to_worker_id.to_string(),
            });
        }

        let message = CollaborativeMessage::new(
            from_worker_id,
            to_worker_id,
            message,
            self.config.max_delivery_attempts,
        );
        let message_id = message.message_id.clone();

        {
            let mut state = self.state.write().await;
            let queue_size = self.config.queue_size;
            let queue = state
                .queues
                .entry(to_worker_id.to_string())
                .or_insert_with(|| PriorityQueue::new(queue_size));
            if !queue.push(message_id.clone(), message.priority) {
                warn!("Worker {} 的消息队列已满，拒绝消息", to_worker_id);
                return Err(CoordinatorError::CapacityExceeded {
                    worker_id: to_worker_id.to_string(),
                    capacity: queue_size,
                });
            }

            let counters = &mut state.counters;
            counters.total_messages += 1;
            *counters
                .messages_by_type
                .entry(message.message_type.as_str().to_string())
                .or_default() += 1;
            *counters
                .messages_by_priority
                .entry(message.priority.as_str().to_string())
                .or_default() += 1;

            debug!(
                "消息 {} 已入队: {} -> {} ({}, {})",
                message_id,
                from_worker_id,
                to_worker_id,
                message.message_type.as_str(),
                message.priority.as_str()
            );
            state.pending.insert(message_id.clone(), message);
        }
        metrics::counter!("coordinator_messages_routed_total").increment(1);

        if !self.config.immediate_delivery {
            return Ok(true);
        }

        let delivered = self.drain_queue(to_worker_id).await;
        Ok(delivered.contains(&message_id))
    }

    /// 广播消息，返回成功路由的目标数
    ///
    /// 未指定类型时发给除发送方外的所有Worker，否则发给这些类型的Worker。
    pub async fn broadcast_message(
        &self,
        from_worker_id: &str,
        message: OutgoingMessage,
        target_worker_types: Option<&[WorkerType]>,
    ) -> usize {
        let targets: Vec<String> = match target_worker_types {
            None => self.directory.active_worker_ids(Some(from_worker_id)).await,
            Some(types) => {
                let mut targets = Vec::new();
                for worker_type in types {
                    for id in self.directory.worker_ids_by_type(*worker_type, false).await {
                        if id != from_worker_id && !targets.contains(&id) {
                            targets.push(id);
                        }
                    }
                }
                targets
            }
        };

        let mut message = message;
        message.message_type = MessageType::Broadcast;
        message.content = tag_broadcast(message.content);

        let mut sent = 0;
        for target in &targets {
            match self.route_message(from_worker_id, target, message.clone()).await {
                Ok(_) => sent += 1,
                Err(e) => warn!("广播消息到 {} 失败: {}", target, e),
            }
        }

        info!("Worker {} 广播消息到 {}/{} 个目标", from_worker_id, sent, targets.len());
        sent
    }

    pub async fn subscribe_to_messages(&self, worker_id: &str, callback: MessageCallback) {
        let mut state = self.state.write().await;
        state
            .subscribers
            .entry(worker_id.to_string())
            .or_default()
            .push(callback);
        debug!("Worker {} 订阅消息", worker_id);
    }

    /// 取消订阅，回调不存在时返回 false
    pub async fn unsubscribe_from_messages(&self, worker_id: &str, callback: &MessageCallback) -> bool {
        let mut state = self.state.write().await;
        let Some(callbacks) = state.subscribers.get_mut(worker_id) else {
            return false;
        };

        let target = Arc::as_ptr(callback) as *const ();
        let Some(pos) = callbacks
            .iter()
            .position(|cb| Arc::as_ptr(cb) as *const () == target)
        else {
            return false;
        };

        callbacks.remove(pos);
        if callbacks.is_empty() {
            state.subscribers.remove(worker_id);
        }
        debug!("Worker {} 取消订阅", worker_id);
        true
    }

    /// 投递一条待处理消息
    ///
    /// 消息已过期或投递次数已用完时拒绝，状态保持 Pending。没有订阅者也视为投递成功。
    pub async fn deliver_message(&self, message_id: &str) -> bool {
        let (message, callbacks) = match self.prepare_delivery(message_id).await {
            DeliveryAttempt::Rejected => return false,
            DeliveryAttempt::Ready { message, callbacks } => (message, callbacks),
        };

        let started = Instant::now();
        let mut callback_error = None;
        for callback in &callbacks {
            if let Err(e) = callback(&message) {
                callback_error = Some(e.to_string());
                break;
            }
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut state = self.state.write().await;
        state.in_flight.remove(message_id);
        match callback_error {
            None => {
                let Some(mut message) = state.pending.remove(message_id) else {
                    return false;
                };
                message.delivery_status = DeliveryStatus::Delivered;
                state.counters.successful_deliveries += 1;
                state.counters.total_delivery_time_ms += elapsed_ms;
                self.record_delivery(&mut state, &message.message_id, elapsed_ms, true, None);
                debug!(
                    "消息 {} 已投递给 {} ({:.2}ms)",
                    message.message_id, message.to_worker_id, elapsed_ms
                );
                self.archive(&mut state, message);
                metrics::counter!("coordinator_messages_delivered_total").increment(1);
                true
            }
            Some(reason) => {
                let exhausted = state
                    .pending
                    .get(message_id)
                    .map(CollaborativeMessage::attempts_exhausted)
                    .unwrap_or(false);
                if exhausted {
                    self.fail_message(&mut state, message_id, &reason);
                } else {
                    warn!("消息 {} 投递失败，稍后重试: {}", message_id, reason);
                }
                false
            }
        }
    }

    async fn prepare_delivery(&self, message_id: &str) -> DeliveryAttempt {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let Some(message) = state.pending.get_mut(message_id) else {
            return DeliveryAttempt::Rejected;
        };
        if message.is_expired(now) {
            debug!("消息 {} 已过期，拒绝投递", message_id);
            return DeliveryAttempt::Rejected;
        }
        if message.attempts_exhausted() {
            debug!("消息 {} 已达到最大投递次数", message_id);
            return DeliveryAttempt::Rejected;
        }

        message.delivery_attempts += 1;
        let message = message.clone();
        state.in_flight.insert(message.message_id.clone());
        let callbacks = state
            .subscribers
            .get(&message.to_worker_id)
            .cloned()
            .unwrap_or_default();

        DeliveryAttempt::Ready { message, callbacks }
    }

    /// 按优先级顺序投递某个接收者队列中的消息，返回已送达的消息ID
    async fn drain_queue(&self, worker_id: &str) -> Vec<String> {
        let _guard = self.delivery_lock.lock().await;
        let mut delivered = Vec::new();
        // 已过期的消息留在队列中，由过期清理统一移除
        let mut expired = Vec::new();

        loop {
            let next = {
                let mut state = self.state.write().await;
                let Some(queue) = state.queues.get_mut(worker_id) else {
                    break;
                };
                queue.pop()
            };
            let Some((message_id, priority)) = next else {
                break;
            };

            if self.deliver_message(&message_id).await {
                delivered.push(message_id);
                continue;
            }

            // 仍可重试的消息放回队首，本轮停止处理该接收者
            let mut state = self.state.write().await;
            let Some(message) = state.pending.get(&message_id) else {
                continue;
            };
            if message.is_expired(Utc::now()) {
                expired.push((message_id, priority));
                continue;
            }
            if !message.attempts_exhausted() {
                if let Some(queue) = state.queues.get_mut(worker_id) {
                    queue.push_front(message_id, priority);
                }
                break;
            }
        }

        if !expired.is_empty() {
            let mut state = self.state.write().await;
            if let Some(queue) = state.queues.get_mut(worker_id) {
                for (message_id, priority) in expired.into_iter().rev() {
                    queue.push_front(message_id, priority);
                }
            }
        }

        delivered
    }

    /// 查看某个Worker的待投递消息（不出队）
    pub async fn get_pending_messages(&self, worker_id: &str) -> Vec<CollaborativeMessage> {
        let state = self.state.read().await;
        state
            .queues
            .get(worker_id)
            .map(|queue| {
                queue
                    .iter()
                    .filter_map(|id| state.pending.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 处理所有队列中的待投递消息，返回成功投递数
    pub async fn process_pending_messages(&self) -> usize {
        let workers: Vec<String> = {
            let state = self.state.read().await;
            state
                .queues
                .iter()
                .filter(|(_, queue)| !queue.is_empty())
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut processed = 0;
        for worker_id in workers {
            processed += self.drain_queue(&worker_id).await.len();
        }
        if processed > 0 {
            debug!("处理了 {} 条待投递消息", processed);
        }
        processed
    }

    /// 清理已过期的待投递消息，返回清理数量
    pub async fn cleanup_expired_messages(&self) -> usize {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let expired: Vec<String> = state
            .pending
            .values()
            .filter(|m| m.is_expired(now) && !state.in_flight.contains(&m.message_id))
            .map(|m| m.message_id.clone())
            .collect();

        for message_id in &expired {
            let Some(mut message) = state.pending.remove(message_id) else {
                continue;
            };
            if let Some(queue) = state.queues.get_mut(&message.to_worker_id) {
                queue.remove(message_id);
            }
            message.delivery_status = DeliveryStatus::Expired;
            state.counters.expired_messages += 1;
            state.counters.failed_deliveries += 1;
            self.record_delivery(&mut state, message_id, 0.0, false, Some("消息已过期".to_string()));
            self.archive(&mut state, message);
            metrics::counter!("coordinator_messages_failed_total").increment(1);
        }

        if !expired.is_empty() {
            info!("清理了 {} 条过期消息", expired.len());
        }
        expired.len()
    }

    /// 与某个Worker相关的历史消息，最新的在前
    pub async fn get_message_history(&self, worker_id: &str, limit: usize) -> Vec<CollaborativeMessage> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .rev()
            .filter(|m| m.from_worker_id == worker_id || m.to_worker_id == worker_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn get_delivery_records(&self, message_id: &str) -> Vec<MessageDeliveryRecord> {
        let state = self.state.read().await;
        state
            .delivery_records
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect()
    }

    pub async fn get_routing_statistics(&self) -> RoutingStatistics {
        let state = self.state.read().await;
        let counters = &state.counters;
        let average_delivery_time_ms = if counters.successful_deliveries == 0 {
            0.0
        } else {
            counters.total_delivery_time_ms / counters.successful_deliveries as f64
        };

        RoutingStatistics {
            total_messages: counters.total_messages,
            successful_deliveries: counters.successful_deliveries,
            failed_deliveries: counters.failed_deliveries,
            expired_messages: counters.expired_messages,
            messages_by_type: counters.messages_by_type.clone(),
            messages_by_priority: counters.messages_by_priority.clone(),
            average_delivery_time_ms,
            pending_messages: state.pending.len(),
            delivery_records: state.delivery_records.len(),
            active_subscriptions: state.subscribers.values().map(Vec::len).sum(),
            history_size: state.history.len(),
        }
    }

    /// 启动消息处理循环：投递待处理消息并清理过期消息
    pub async fn start(self: &Arc<Self>, shutdown: &ShutdownManager) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let mut shutdown_rx = shutdown.subscribe().await;
        let interval = self.config.process_interval();

        tokio::spawn(async move {
            info!("启动消息处理循环，间隔: {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        router.process_pending_messages().await;
                        router.cleanup_expired_messages().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("收到关闭信号，退出消息处理循环");
                        break;
                    }
                }
            }
        })
    }

    /// 清空队列、待处理消息和订阅
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let pending = state.pending.len();
        state.queues.clear();
        state.pending.clear();
        state.in_flight.clear();
        state.subscribers.clear();
        info!("消息路由器已关闭，丢弃 {} 条待投递消息", pending);
    }

    fn fail_message(&self, state: &mut RouterState, message_id: &str, reason: &str) {
        let Some(mut message) = state.pending.remove(message_id) else {
            return;
        };
        if let Some(queue) = state.queues.get_mut(&message.to_worker_id) {
            queue.remove(message_id);
        }
        message.delivery_status = DeliveryStatus::Failed;
        state.counters.failed_deliveries += 1;
        error!(
            "消息 {} 在 {} 次尝试后投递失败: {}",
            message_id, message.delivery_attempts, reason
        );
        self.record_delivery(state, message_id, 0.0, false, Some(reason.to_string()));
        self.archive(state, message);
        metrics::counter!("coordinator_messages_failed_total").increment(1);
    }

    fn record_delivery(
        &self,
        state: &mut RouterState,
        message_id: &str,
        delivery_time_ms: f64,
        success: bool,
        error_message: Option<String>,
    ) {
        state.delivery_records.push(MessageDeliveryRecord {
            message_id: message_id.to_string(),
            delivered_at: Utc::now(),
            delivery_time_ms,
            success,
            error_message,
        });
        if state.delivery_records.len() > self.config.delivery_record_limit {
            let excess = state.delivery_records.len() - self.config.delivery_record_trim_len();
            state.delivery_records.drain(..excess);
        }
    }

    fn archive(&self, state: &mut RouterState, message: CollaborativeMessage) {
        state.history.push(message);
        if state.history.len() > self.config.history_limit {
            let excess = state.history.len() - self.config.history_trim_len();
            state.history.drain(..excess);
        }
    }
}

fn tag_broadcast(content: serde_json::Value) -> serde_json::Value {
    let mut content = match content {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };
    content.insert(
        "message_type".to_string(),
        serde_json::Value::String(MessageType::Broadcast.as_str().to_string()),
    );
    content.insert("broadcast".to_string(), serde_json::Value::Bool(true));
    serde_json::Value::Object(content)
}

#[async_trait]
impl MessageSender for MessageRouter {
    async fn send_message(
        &self,
        from_worker_id: &str,
        to_worker_id: &str,
        message: OutgoingMessage,
    ) -> CoordinatorResult<bool> {
        self.route_message(from_worker_id, to_worker_id, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_broadcast_wraps_non_objects() {
        let tagged = tag_broadcast(json!("hello"));
        assert_eq!(tagged["payload"], "hello");
        assert_eq!(tagged["broadcast"], true);
        assert_eq!(tagged["message_type"], "broadcast");

        let tagged = tag_broadcast(json!({"text": "hi"}));
        assert_eq!(tagged["text"], "hi");
        assert_eq!(tagged["broadcast"], true);
    }
}
