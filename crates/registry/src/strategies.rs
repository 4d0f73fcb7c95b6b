use std::sync::Arc;

use tracing::debug;

use coordinator_core::{
    models::{TaskRequirements, WorkerDescriptor},
    CoordinatorError, CoordinatorResult,
};

/// Worker选择策略
///
/// 候选列表按注册顺序传入，评分相同时先注册者胜出。
pub trait SelectionStrategy: Send + Sync {
    /// 计算Worker对任务的匹配评分
    fn score(&self, worker: &WorkerDescriptor, requirements: &TaskRequirements) -> f64;

    fn name(&self) -> &str;

    fn select<'a>(
        &self,
        candidates: &[&'a WorkerDescriptor],
        requirements: &TaskRequirements,
    ) -> Option<&'a WorkerDescriptor> {
        let mut best: Option<(&'a WorkerDescriptor, f64)> = None;
        for &worker in candidates {
            let score = self.score(worker, requirements);
            debug!("{} 策略评分: {} = {:.2}", self.name(), worker.worker_id, score);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((worker, score)),
            }
        }
        best.map(|(worker, _)| worker)
    }
}

/// 能力加权策略：优先级评分 + 成功率 − 负载惩罚 + 能力匹配
pub struct CapabilityWeightedStrategy;

impl CapabilityWeightedStrategy {
    pub fn new() -> Self {
        Self
    }

    /// 匹配到的所需能力名
    pub fn matched_capabilities(
        worker: &WorkerDescriptor,
        requirements: &TaskRequirements,
    ) -> Vec<String> {
        requirements
            .capabilities
            .iter()
            .filter(|required| worker.capability_level(required).is_some())
            .cloned()
            .collect()
    }
}

impl Default for CapabilityWeightedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for CapabilityWeightedStrategy {
    fn score(&self, worker: &WorkerDescriptor, requirements: &TaskRequirements) -> f64 {
        let load_factor = requirements.priority as f64 / 2.0;

        let mut score = worker.load_stats.priority_score;
        score += worker.performance.success_rate * 2.0;
        score -= worker.load_stats.load_ratio() * 3.0 * load_factor;

        for required in &requirements.capabilities {
            if let Some(level) = worker.capability_level(required) {
                score += 1.5 + 0.2 * level as f64;
            }
        }

        score.max(0.0)
    }

    fn name(&self) -> &str {
        "CapabilityWeighted"
    }
}

/// 最小负载策略，不考虑能力
pub struct LeastLoadedStrategy;

impl LeastLoadedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LeastLoadedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStrategy for LeastLoadedStrategy {
    fn score(&self, worker: &WorkerDescriptor, _requirements: &TaskRequirements) -> f64 {
        -worker.load_stats.load_ratio()
    }

    fn name(&self) -> &str {
        "LeastLoaded"
    }
}

/// 根据配置名创建策略
pub fn create_strategy(name: &str) -> CoordinatorResult<Arc<dyn SelectionStrategy>> {
    match name {
        "capability_weighted" => Ok(Arc::new(CapabilityWeightedStrategy::new())),
        "least_loaded" => Ok(Arc::new(LeastLoadedStrategy::new())),
        other => Err(CoordinatorError::Configuration(format!(
            "无效的选择策略: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coordinator_core::models::{
        LoadBalancingStats, WorkerCapability, WorkerPerformance, WorkerType,
    };

    fn descriptor(id: &str, seq: u64, coding_level: Option<u32>, load: u32) -> WorkerDescriptor {
        let now = Utc::now();
        let enhanced_capabilities = coding_level
            .map(|level| {
                vec![WorkerCapability {
                    name: "coding".to_string(),
                    level,
                    description: String::new(),
                    last_used: None,
                }]
            })
            .unwrap_or_default();
        let mut load_stats = LoadBalancingStats::new(4, 6.3);
        load_stats.current_load = load;
        WorkerDescriptor {
            worker_id: id.to_string(),
            name: id.to_string(),
            role: "executor".to_string(),
            job_description: String::new(),
            worker_type: WorkerType::Executor,
            capabilities: vec![],
            enhanced_capabilities,
            performance: WorkerPerformance::new(6.0, now),
            load_stats,
            registered_at: now,
            registration_seq: seq,
        }
    }

    #[test]
    fn test_capability_level_breaks_equal_load() {
        let strong = descriptor("executor-1", 0, Some(8), 0);
        let weak = descriptor("executor-2", 1, Some(6), 0);
        let requirements = TaskRequirements::new().with_capabilities(["coding"]);

        let strategy = CapabilityWeightedStrategy::new();
        let selected = strategy.select(&[&weak, &strong], &requirements).unwrap();
        assert_eq!(selected.worker_id, "executor-1");
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let first = descriptor("a", 0, Some(5), 0);
        let second = descriptor("b", 1, Some(5), 0);
        let requirements = TaskRequirements::new();

        let strategy = CapabilityWeightedStrategy::new();
        assert_eq!(strategy.select(&[&first, &second], &requirements).unwrap().worker_id, "a");

        let strategy = LeastLoadedStrategy::new();
        assert_eq!(strategy.select(&[&first, &second], &requirements).unwrap().worker_id, "a");
    }

    #[test]
    fn test_least_loaded_prefers_idle() {
        let busy = descriptor("busy", 0, Some(9), 3);
        let idle = descriptor("idle", 1, None, 0);
        let strategy = LeastLoadedStrategy::new();
        let selected = strategy
            .select(&[&busy, &idle], &TaskRequirements::new())
            .unwrap();
        assert_eq!(selected.worker_id, "idle");
    }

    #[test]
    fn test_score_floored_at_zero() {
        let mut worker = descriptor("w", 0, None, 4);
        worker.load_stats.priority_score = 0.0;
        worker.performance.success_rate = 0.0;
        let requirements = TaskRequirements::new().with_priority(4);
        assert_eq!(CapabilityWeightedStrategy::new().score(&worker, &requirements), 0.0);
    }

    #[test]
    fn test_create_strategy() {
        assert_eq!(create_strategy("least_loaded").unwrap().name(), "LeastLoaded");
        assert!(create_strategy("round_robin").is_err());
    }
}
