use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use coordinator_core::{
    config::RegistryConfig,
    models::{
        FlowchartStatus, LoadBalancingStats, TaskRequirements, WorkerCapability, WorkerDescriptor,
        WorkerFlowchart, WorkerPerformance, WorkerRegistration, WorkerType,
    },
    traits::WorkerDirectory,
    CoordinatorError, CoordinatorResult,
};

use crate::flowchart::plan_flowchart;
use crate::strategies::{create_strategy, CapabilityWeightedStrategy, SelectionStrategy};

struct WorkerEntry {
    descriptor: WorkerDescriptor,
    /// 每个进行中的分配匹配到的能力，按分配顺序排列；完成时取最早的一组更新 last_used
    matched_capabilities: VecDeque<Vec<String>>,
}

#[derive(Default)]
struct RegistryState {
    workers: HashMap<String, WorkerEntry>,
    /// 按注册顺序排列
    workers_by_type: HashMap<WorkerType, Vec<String>>,
    flowcharts: HashMap<String, WorkerFlowchart>,
    active_flowcharts: Vec<String>,
    next_seq: u64,
    total_tasks_assigned: u64,
    successful_assignments: u64,
    failed_assignments: u64,
}

impl RegistryState {
    fn ordered_ids(&self, worker_type: WorkerType) -> &[String] {
        self.workers_by_type
            .get(&worker_type)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    fn descriptors_by_type(&self, worker_type: WorkerType, available_only: bool) -> Vec<&WorkerDescriptor> {
        self.ordered_ids(worker_type)
            .iter()
            .filter_map(|id| self.workers.get(id))
            .map(|entry| &entry.descriptor)
            .filter(|worker| !available_only || worker.load_stats.is_available())
            .collect()
    }

    fn remove_worker(&mut self, worker_id: &str) -> Option<WorkerEntry> {
        let entry = self.workers.remove(worker_id)?;
        if let Some(ids) = self.workers_by_type.get_mut(&entry.descriptor.worker_type) {
            ids.retain(|id| id != worker_id);
        }
        Some(entry)
    }

    fn sorted_descriptors(&self) -> Vec<&WorkerDescriptor> {
        let mut workers: Vec<&WorkerDescriptor> =
            self.workers.values().map(|entry| &entry.descriptor).collect();
        workers.sort_by_key(|worker| worker.registration_seq);
        workers
    }
}

/// 单个Worker的统计摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub worker_type: WorkerType,
    pub current_load: u32,
    pub max_concurrent_tasks: u32,
    pub tasks_completed: u64,
    pub success_rate: f64,
    pub specialization_score: f64,
}

/// 注册表统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStatistics {
    pub total_workers: usize,
    pub workers_by_type: HashMap<String, usize>,
    pub available_by_type: HashMap<String, usize>,
    pub total_flowcharts: usize,
    pub active_flowcharts: usize,
    pub total_tasks_assigned: u64,
    pub successful_assignments: u64,
    pub failed_assignments: u64,
    pub total_current_load: u64,
    pub total_capacity: u64,
    pub average_success_rate: f64,
    pub average_load_ratio: f64,
    pub workers: Vec<WorkerSummary>,
}

/// 专业化Worker注册表
///
/// 维护Worker的能力、性能统计和当前负载，提供按类型查找、负载均衡选择和流程图管理。
pub struct WorkerRegistry {
    config: RegistryConfig,
    strategy: Arc<dyn SelectionStrategy>,
    state: RwLock<RegistryState>,
}

impl WorkerRegistry {
    /// 创建新的Worker注册表
    pub fn new(config: RegistryConfig) -> CoordinatorResult<Self> {
        let strategy = create_strategy(&config.selection_strategy)?;
        Ok(Self::with_strategy(config, strategy))
    }

    pub fn with_strategy(config: RegistryConfig, strategy: Arc<dyn SelectionStrategy>) -> Self {
        info!("创建Worker注册表，选择策略: {}", strategy.name());
        Self {
            config,
            strategy,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// 注册专业化Worker，返回本次注册的审计ID
    ///
    /// 同一ID重复注册会更新名称、能力和并发上限，保留当前负载和注册顺序；
    /// Worker类型一经注册不可变更。
    pub async fn register_specialized_worker(
        &self,
        worker_id: &str,
        registration: WorkerRegistration,
    ) -> CoordinatorResult<String> {
        let worker_type: WorkerType = registration.worker_type.parse()?;
        let now = Utc::now();

        let mut enhanced_capabilities: Vec<WorkerCapability> = registration
            .enhanced_capabilities
            .iter()
            .cloned()
            .map(WorkerCapability::from)
            .collect();
        let declared_enhanced = enhanced_capabilities.len();

        let mut capabilities = registration.capabilities.clone();
        for cap in &enhanced_capabilities {
            if !capabilities.contains(&cap.name) {
                capabilities.push(cap.name.clone());
            }
        }
        for name in &registration.capabilities {
            if !enhanced_capabilities.iter().any(|cap| &cap.name == name) {
                enhanced_capabilities.push(WorkerCapability {
                    name: name.clone(),
                    level: 5,
                    description: String::new(),
                    last_used: None,
                });
            }
        }

        let max_concurrent_tasks = registration
            .max_concurrent_tasks
            .filter(|max| *max > 0)
            .unwrap_or(self.config.default_max_concurrent_tasks);
        let priority_score =
            worker_type.base_priority() + (0.3 * declared_enhanced as f64).min(2.0);
        let specialization_score = 5.0
            + (0.5 * capabilities.len() as f64).min(3.0)
            + worker_type.specialization_bonus();

        let name = registration.name.unwrap_or_else(|| worker_id.to_string());
        let role = registration
            .role
            .unwrap_or_else(|| worker_type.as_str().to_string());
        let job_description = registration.job_description.unwrap_or_default();

        let mut state = self.state.write().await;

        if let Some(entry) = state.workers.get_mut(worker_id) {
            let existing = &mut entry.descriptor;
            if existing.worker_type != worker_type {
                return Err(CoordinatorError::WorkerTypeChanged {
                    worker_id: worker_id.to_string(),
                    registered: existing.worker_type.to_string(),
                    requested: worker_type.to_string(),
                });
            }

            existing.name = name;
            existing.role = role;
            existing.job_description = job_description;
            existing.capabilities = capabilities;
            existing.enhanced_capabilities = enhanced_capabilities;
            existing.load_stats.max_concurrent_tasks = max_concurrent_tasks;
            existing.load_stats.priority_score = priority_score;
            existing.performance.specialization_score = specialization_score;
            existing.performance.last_active = now;

            info!("更新已注册的Worker: {} ({})", worker_id, worker_type);
        } else {
            let seq = state.next_seq;
            state.next_seq += 1;

            let descriptor = WorkerDescriptor {
                worker_id: worker_id.to_string(),
                name,
                role,
                job_description,
                worker_type,
                capabilities,
                enhanced_capabilities,
                performance: WorkerPerformance::new(specialization_score, now),
                load_stats: LoadBalancingStats::new(max_concurrent_tasks, priority_score),
                registered_at: now,
                registration_seq: seq,
            };
            state.workers.insert(
                worker_id.to_string(),
                WorkerEntry {
                    descriptor,
                    matched_capabilities: VecDeque::new(),
                },
            );
            state
                .workers_by_type
                .entry(worker_type)
                .or_default()
                .push(worker_id.to_string());

            info!(
                "注册Worker: {} (类型: {}, 最大并发: {}, 优先级评分: {:.1})",
                worker_id, worker_type, max_concurrent_tasks, priority_score
            );
        }

        Ok(Uuid::new_v4().to_string())
    }

    /// 注销Worker
    pub async fn unregister_worker(&self, worker_id: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = state.remove_worker(worker_id).is_some();
        if removed {
            info!("注销Worker: {}", worker_id);
        }
        removed
    }

    pub async fn get_worker(&self, worker_id: &str) -> Option<WorkerDescriptor> {
        let state = self.state.read().await;
        state
            .workers
            .get(worker_id)
            .map(|entry| entry.descriptor.clone())
    }

    /// 所有已注册Worker（按注册顺序），可排除一个
    pub async fn get_active_workers(&self, exclude: Option<&str>) -> Vec<WorkerDescriptor> {
        let state = self.state.read().await;
        state
            .sorted_descriptors()
            .into_iter()
            .filter(|worker| Some(worker.worker_id.as_str()) != exclude)
            .cloned()
            .collect()
    }

    /// 按类型查找Worker，`available_only` 时排除已满载的Worker
    pub async fn find_workers_by_type(
        &self,
        worker_type: WorkerType,
        available_only: bool,
    ) -> Vec<WorkerDescriptor> {
        let state = self.state.read().await;
        state
            .descriptors_by_type(worker_type, available_only)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 负载均衡选择Worker
    ///
    /// 选中的Worker负载加一；没有满足条件的Worker时返回 None。
    pub async fn get_load_balanced_worker(
        &self,
        worker_type: WorkerType,
        requirements: &TaskRequirements,
    ) -> Option<WorkerDescriptor> {
        let mut state = self.state.write().await;

        let (selected_id, matched) = {
            let candidates: Vec<&WorkerDescriptor> = state
                .descriptors_by_type(worker_type, true)
                .into_iter()
                .filter(|worker| !requirements.is_excluded(&worker.worker_id))
                .collect();

            if candidates.is_empty() {
                debug!("没有可用的 {} 类型Worker", worker_type);
                return None;
            }

            let selected = self.strategy.select(&candidates, requirements)?;
            (
                selected.worker_id.clone(),
                CapabilityWeightedStrategy::matched_capabilities(selected, requirements),
            )
        };

        state.total_tasks_assigned += 1;
        let entry = state.workers.get_mut(&selected_id)?;
        entry.descriptor.load_stats.assign(Utc::now());
        entry.matched_capabilities.push_back(matched);

        debug!(
            "{} 策略选择Worker: {} (负载: {}/{})",
            self.strategy.name(),
            selected_id,
            entry.descriptor.load_stats.current_load,
            entry.descriptor.load_stats.max_concurrent_tasks
        );

        Some(entry.descriptor.clone())
    }

    /// 完成任务分配，释放负载并更新性能统计
    pub async fn complete_task_assignment(
        &self,
        worker_id: &str,
        success: bool,
        completion_time_seconds: f64,
    ) -> CoordinatorResult<()> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let entry = state
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| CoordinatorError::WorkerNotFound {
                id: worker_id.to_string(),
            })?;

        entry.descriptor.load_stats.release();
        entry
            .descriptor
            .performance
            .record_completion(success, completion_time_seconds, now);

        let matched = entry.matched_capabilities.pop_front().unwrap_or_default();
        for cap in entry
            .descriptor
            .enhanced_capabilities
            .iter_mut()
            .filter(|cap| matched.contains(&cap.name))
        {
            cap.last_used = Some(now);
        }

        debug!(
            "Worker {} 完成任务 (成功: {}, 耗时: {:.1}s, 成功率: {:.2})",
            worker_id, success, completion_time_seconds, entry.descriptor.performance.success_rate
        );

        if success {
            state.successful_assignments += 1;
        } else {
            state.failed_assignments += 1;
        }

        Ok(())
    }

    /// 刷新Worker的活跃时间
    pub async fn record_activity(&self, worker_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.workers.get_mut(worker_id) {
            Some(entry) => {
                entry.descriptor.performance.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn create_worker_flowchart(
        &self,
        objectives: &str,
        created_by: &str,
        planner_count: u32,
        executor_count: u32,
        verifier_count: u32,
    ) -> WorkerFlowchart {
        let flowchart = plan_flowchart(
            objectives,
            created_by,
            planner_count,
            executor_count,
            verifier_count,
        );

        let mut state = self.state.write().await;
        state
            .flowcharts
            .insert(flowchart.flowchart_id.clone(), flowchart.clone());

        info!(
            "创建流程图: {} (规划者: {}, 执行者: {}, 验证者: {})",
            flowchart.flowchart_id, planner_count, executor_count, verifier_count
        );
        flowchart
    }

    /// 激活草稿状态的流程图
    pub async fn activate_flowchart(&self, flowchart_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.flowcharts.get_mut(flowchart_id) {
            Some(flowchart) if flowchart.status == FlowchartStatus::Draft => {
                flowchart.status = FlowchartStatus::Active;
            }
            Some(flowchart) => {
                warn!(
                    "流程图 {} 当前状态为 {:?}，无法激活",
                    flowchart_id, flowchart.status
                );
                return false;
            }
            None => return false,
        }
        state.active_flowcharts.push(flowchart_id.to_string());
        info!("激活流程图: {}", flowchart_id);
        true
    }

    /// 完成活跃流程图并移出活跃集合
    pub async fn complete_flowchart(&self, flowchart_id: &str) -> bool {
        let mut state = self.state.write().await;
        match state.flowcharts.get_mut(flowchart_id) {
            Some(flowchart) if flowchart.status == FlowchartStatus::Active => {
                flowchart.status = FlowchartStatus::Completed;
            }
            _ => return false,
        }
        state.active_flowcharts.retain(|id| id != flowchart_id);
        info!("流程图已完成: {}", flowchart_id);
        true
    }

    pub async fn get_flowchart(&self, flowchart_id: &str) -> CoordinatorResult<WorkerFlowchart> {
        let state = self.state.read().await;
        state
            .flowcharts
            .get(flowchart_id)
            .cloned()
            .ok_or_else(|| CoordinatorError::FlowchartNotFound {
                id: flowchart_id.to_string(),
            })
    }

    pub async fn get_active_flowcharts(&self) -> Vec<WorkerFlowchart> {
        let state = self.state.read().await;
        state
            .active_flowcharts
            .iter()
            .filter_map(|id| state.flowcharts.get(id))
            .cloned()
            .collect()
    }

    /// 清理长时间不活跃的Worker，返回清理数量
    ///
    /// 阈值限制在正负一百年之内。
    pub async fn cleanup_inactive_workers(&self, inactive_threshold_minutes: i64) -> usize {
        const LIMIT_MINUTES: i64 = 100 * 365 * 24 * 60;
        let threshold = inactive_threshold_minutes.clamp(-LIMIT_MINUTES, LIMIT_MINUTES);
        let cutoff = Utc::now() - Duration::minutes(threshold);
        let mut state = self.state.write().await;

        let stale: Vec<String> = state
            .workers
            .values()
            .filter(|entry| entry.descriptor.performance.last_active < cutoff)
            .map(|entry| entry.descriptor.worker_id.clone())
            .collect();

        for worker_id in &stale {
            state.remove_worker(worker_id);
            info!("清理不活跃Worker: {}", worker_id);
        }

        stale.len()
    }

    /// 使用配置中的阈值清理
    pub async fn cleanup_with_configured_threshold(&self) -> usize {
        self.cleanup_inactive_workers(self.config.inactive_threshold_minutes)
            .await
    }

    pub async fn get_registry_statistics(&self) -> RegistryStatistics {
        let state = self.state.read().await;

        let mut workers_by_type = HashMap::new();
        let mut available_by_type = HashMap::new();
        for worker_type in WorkerType::all() {
            workers_by_type.insert(
                worker_type.to_string(),
                state.descriptors_by_type(worker_type, false).len(),
            );
            available_by_type.insert(
                worker_type.to_string(),
                state.descriptors_by_type(worker_type, true).len(),
            );
        }

        let descriptors = state.sorted_descriptors();
        let total_workers = descriptors.len();
        let total_current_load = descriptors
            .iter()
            .map(|w| w.load_stats.current_load as u64)
            .sum();
        let total_capacity = descriptors
            .iter()
            .map(|w| w.load_stats.max_concurrent_tasks as u64)
            .sum();
        let (average_success_rate, average_load_ratio) = if total_workers == 0 {
            (0.0, 0.0)
        } else {
            (
                descriptors.iter().map(|w| w.performance.success_rate).sum::<f64>()
                    / total_workers as f64,
                descriptors.iter().map(|w| w.load_stats.load_ratio()).sum::<f64>()
                    / total_workers as f64,
            )
        };

        let workers = descriptors
            .iter()
            .map(|w| WorkerSummary {
                worker_id: w.worker_id.clone(),
                worker_type: w.worker_type,
                current_load: w.load_stats.current_load,
                max_concurrent_tasks: w.load_stats.max_concurrent_tasks,
                tasks_completed: w.performance.tasks_completed,
                success_rate: w.performance.success_rate,
                specialization_score: w.performance.specialization_score,
            })
            .collect();

        RegistryStatistics {
            total_workers,
            workers_by_type,
            available_by_type,
            total_flowcharts: state.flowcharts.len(),
            active_flowcharts: state.active_flowcharts.len(),
            total_tasks_assigned: state.total_tasks_assigned,
            successful_assignments: state.successful_assignments,
            failed_assignments: state.failed_assignments,
            total_current_load,
            total_capacity,
            average_success_rate,
            average_load_ratio,
            workers,
        }
    }

    /// 清空所有注册信息
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let count = state.workers.len();
        *state = RegistryState::default();
        info!("Worker注册表已关闭，清理 {} 个Worker", count);
    }
}

#[async_trait]
impl WorkerDirectory for WorkerRegistry {
    async fn is_registered(&self, worker_id: &str) -> bool {
        self.state.read().await.workers.contains_key(worker_id)
    }

    async fn active_worker_ids(&self, exclude: Option<&str>) -> Vec<String> {
        let state = self.state.read().await;
        state
            .sorted_descriptors()
            .into_iter()
            .map(|worker| worker.worker_id.clone())
            .filter(|id| Some(id.as_str()) != exclude)
            .collect()
    }

    async fn worker_ids_by_type(&self, worker_type: WorkerType, available_only: bool) -> Vec<String> {
        let state = self.state.read().await;
        state
            .descriptors_by_type(worker_type, available_only)
            .into_iter()
            .map(|worker| worker.worker_id.clone())
            .collect()
    }

    async fn worker_type(&self, worker_id: &str) -> Option<WorkerType> {
        let state = self.state.read().await;
        state
            .workers
            .get(worker_id)
            .map(|entry| entry.descriptor.worker_type)
    }

    async fn select_worker(
        &self,
        worker_type: WorkerType,
        requirements: &TaskRequirements,
    ) -> Option<WorkerDescriptor> {
        self.get_load_balanced_worker(worker_type, requirements).await
    }

    async fn priority_rank(&self, worker_id: &str) -> Option<(f64, u64)> {
        let state = self.state.read().await;
        state.workers.get(worker_id).map(|entry| {
            (
                entry.descriptor.load_stats.priority_score,
                entry.descriptor.registration_seq,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> WorkerRegistry {
        WorkerRegistry::new(RegistryConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_worker_type_rejected() {
        let registry = registry();
        let result = registry
            .register_specialized_worker("w1", WorkerRegistration::new("manager"))
            .await;
        assert!(matches!(result, Err(CoordinatorError::InvalidWorkerType { .. })));
        assert!(registry.get_worker("w1").await.is_none());
    }

    #[tokio::test]
    async fn test_reregistration_keeps_load_and_order() {
        let registry = registry();
        registry
            .register_specialized_worker("a", WorkerRegistration::new("executor"))
            .await
            .unwrap();
        registry
            .register_specialized_worker("b", WorkerRegistration::new("executor"))
            .await
            .unwrap();
        registry
            .get_load_balanced_worker(WorkerType::Executor, &TaskRequirements::new())
            .await
            .unwrap();

        registry
            .register_specialized_worker(
                "a",
                WorkerRegistration::new("executor").with_max_concurrent_tasks(5),
            )
            .await
            .unwrap();

        let a = registry.get_worker("a").await.unwrap();
        assert_eq!(a.load_stats.current_load, 1);
        assert_eq!(a.load_stats.max_concurrent_tasks, 5);
        let ids: Vec<String> = registry
            .find_workers_by_type(WorkerType::Executor, false)
            .await
            .into_iter()
            .map(|w| w.worker_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let result = registry
            .register_specialized_worker("a", WorkerRegistration::new("planner"))
            .await;
        assert!(matches!(result, Err(CoordinatorError::WorkerTypeChanged { .. })));
    }

    #[tokio::test]
    async fn test_scores_from_registration() {
        let registry = registry();
        registry
            .register_specialized_worker(
                "v1",
                WorkerRegistration::new("verifier")
                    .with_capability("review", 7)
                    .with_capability("testing", 6),
            )
            .await
            .unwrap();
        let v1 = registry.get_worker("v1").await.unwrap();
        assert!((v1.load_stats.priority_score - 7.6).abs() < 1e-9);
        assert!((v1.performance.specialization_score - 7.5).abs() < 1e-9);
        assert_eq!(v1.load_stats.max_concurrent_tasks, 3);
        assert_eq!(v1.performance.success_rate, 1.0);
    }

    #[tokio::test]
    async fn test_excluded_worker_never_selected() {
        let registry = registry();
        registry
            .register_specialized_worker("e1", WorkerRegistration::new("executor").with_capability("coding", 9))
            .await
            .unwrap();
        registry
            .register_specialized_worker("e2", WorkerRegistration::new("executor"))
            .await
            .unwrap();

        let requirements = TaskRequirements::new()
            .with_capabilities(["coding"])
            .excluding("e1");
        let selected = registry
            .get_load_balanced_worker(WorkerType::Executor, &requirements)
            .await
            .unwrap();
        assert_eq!(selected.worker_id, "e2");
    }

    #[tokio::test]
    async fn test_completion_stamps_matched_capability() {
        let registry = registry();
        registry
            .register_specialized_worker(
                "e1",
                WorkerRegistration::new("executor")
                    .with_capability("coding", 8)
                    .with_capability("docs", 4),
            )
            .await
            .unwrap();

        registry
            .get_load_balanced_worker(
                WorkerType::Executor,
                &TaskRequirements::new().with_capabilities(["coding"]),
            )
            .await
            .unwrap();
        registry.complete_task_assignment("e1", true, 2.0).await.unwrap();

        let e1 = registry.get_worker("e1").await.unwrap();
        let coding = e1.enhanced_capabilities.iter().find(|c| c.name == "coding").unwrap();
        let docs = e1.enhanced_capabilities.iter().find(|c| c.name == "docs").unwrap();
        assert!(coding.last_used.is_some());
        assert!(docs.last_used.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_assignments_stamp_their_own_capabilities() {
        let registry = registry();
        registry
            .register_specialized_worker(
                "e1",
                WorkerRegistration::new("executor")
                    .with_capability("coding", 8)
                    .with_capability("docs", 4),
            )
            .await
            .unwrap();

        for capability in ["coding", "docs"] {
            registry
                .get_load_balanced_worker(
                    WorkerType::Executor,
                    &TaskRequirements::new().with_capabilities([capability]),
                )
                .await
                .unwrap();
        }
        let last_used = |worker: &WorkerDescriptor, name: &str| {
            worker
                .enhanced_capabilities
                .iter()
                .find(|c| c.name == name)
                .and_then(|c| c.last_used)
        };

        registry.complete_task_assignment("e1", true, 1.0).await.unwrap();
        let e1 = registry.get_worker("e1").await.unwrap();
        assert!(last_used(&e1, "coding").is_some());
        assert!(last_used(&e1, "docs").is_none());

        registry.complete_task_assignment("e1", true, 1.0).await.unwrap();
        let e1 = registry.get_worker("e1").await.unwrap();
        assert!(last_used(&e1, "docs").is_some());
        assert_eq!(e1.load_stats.current_load, 0);
    }

    #[tokio::test]
    async fn test_complete_unknown_worker() {
        let registry = registry();
        let result = registry.complete_task_assignment("ghost", true, 1.0).await;
        assert!(matches!(result, Err(CoordinatorError::WorkerNotFound { .. })));
    }
}
