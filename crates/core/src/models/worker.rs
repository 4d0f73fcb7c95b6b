use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoordinatorError;

/// 专业化Worker类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkerType {
    Planner,
    Executor,
    Verifier,
}

impl WorkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Planner => "planner",
            WorkerType::Executor => "executor",
            WorkerType::Verifier => "verifier",
        }
    }

    pub fn all() -> [WorkerType; 3] {
        [WorkerType::Planner, WorkerType::Executor, WorkerType::Verifier]
    }

    /// 负载均衡的基础优先级
    pub fn base_priority(&self) -> f64 {
        match self {
            WorkerType::Planner => 8.0,
            WorkerType::Executor => 6.0,
            WorkerType::Verifier => 7.0,
        }
    }

    /// 专业化评分的类型加成
    pub fn specialization_bonus(&self) -> f64 {
        match self {
            WorkerType::Planner => 1.0,
            WorkerType::Executor => 0.5,
            WorkerType::Verifier => 1.5,
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerType {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "planner" => Ok(WorkerType::Planner),
            "executor" => Ok(WorkerType::Executor),
            "verifier" => Ok(WorkerType::Verifier),
            _ => Err(CoordinatorError::InvalidWorkerType {
                value: s.to_string(),
            }),
        }
    }
}

fn default_capability_level() -> u32 {
    5
}

/// 注册时声明的能力
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilitySpec {
    pub name: String,
    #[serde(default = "default_capability_level")]
    pub level: u32,
    #[serde(default)]
    pub description: String,
}

impl CapabilitySpec {
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self {
            name: name.into(),
            level,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Worker能力
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerCapability {
    pub name: String,
    /// 熟练度（1-10）
    pub level: u32,
    pub description: String,
    pub last_used: Option<DateTime<Utc>>,
}

impl From<CapabilitySpec> for WorkerCapability {
    fn from(spec: CapabilitySpec) -> Self {
        Self {
            name: spec.name,
            level: spec.level,
            description: spec.description,
            last_used: None,
        }
    }
}

/// Worker注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegistration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    pub worker_type: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub enhanced_capabilities: Vec<CapabilitySpec>,
    #[serde(default)]
    pub max_concurrent_tasks: Option<u32>,
}

impl WorkerRegistration {
    pub fn new(worker_type: impl Into<String>) -> Self {
        Self {
            name: None,
            role: None,
            job_description: None,
            worker_type: worker_type.into(),
            capabilities: Vec::new(),
            enhanced_capabilities: Vec::new(),
            max_concurrent_tasks: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// 同时登记简单能力名和带等级的能力
    pub fn with_capability(mut self, name: impl Into<String>, level: u32) -> Self {
        let name = name.into();
        if !self.capabilities.contains(&name) {
            self.capabilities.push(name.clone());
        }
        self.enhanced_capabilities.push(CapabilitySpec::new(name, level));
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max_concurrent_tasks: u32) -> Self {
        self.max_concurrent_tasks = Some(max_concurrent_tasks);
        self
    }
}

/// 负载均衡统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadBalancingStats {
    pub current_load: u32,
    pub max_concurrent_tasks: u32,
    pub priority_score: f64,
    pub last_assigned: Option<DateTime<Utc>>,
}

impl LoadBalancingStats {
    pub fn new(max_concurrent_tasks: u32, priority_score: f64) -> Self {
        Self {
            current_load: 0,
            max_concurrent_tasks,
            priority_score,
            last_assigned: None,
        }
    }

    /// 是否还有空闲容量
    pub fn is_available(&self) -> bool {
        self.current_load < self.max_concurrent_tasks
    }

    pub fn load_ratio(&self) -> f64 {
        if self.max_concurrent_tasks == 0 {
            0.0
        } else {
            self.current_load as f64 / self.max_concurrent_tasks as f64
        }
    }

    pub fn assign(&mut self, now: DateTime<Utc>) {
        self.current_load += 1;
        self.last_assigned = Some(now);
    }

    pub fn release(&mut self) {
        self.current_load = self.current_load.saturating_sub(1);
    }
}

/// Worker性能统计
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerPerformance {
    pub tasks_completed: u64,
    /// 成功率，指数移动平均（0.9/0.1）
    pub success_rate: f64,
    /// 平均完成时间（秒），指数移动平均
    pub average_completion_time: f64,
    pub last_active: DateTime<Utc>,
    pub specialization_score: f64,
}

impl WorkerPerformance {
    pub fn new(specialization_score: f64, now: DateTime<Utc>) -> Self {
        Self {
            tasks_completed: 0,
            success_rate: 1.0,
            average_completion_time: 0.0,
            last_active: now,
            specialization_score,
        }
    }

    pub fn record_completion(&mut self, success: bool, completion_time_seconds: f64, now: DateTime<Utc>) {
        self.tasks_completed += 1;
        self.last_active = now;
        self.success_rate = 0.9 * self.success_rate + 0.1 * if success { 1.0 } else { 0.0 };
        self.average_completion_time =
            0.9 * self.average_completion_time + 0.1 * completion_time_seconds;
    }
}

/// 对外返回的Worker描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub worker_id: String,
    pub name: String,
    pub role: String,
    pub job_description: String,
    pub worker_type: WorkerType,
    pub capabilities: Vec<String>,
    pub enhanced_capabilities: Vec<WorkerCapability>,
    pub performance: WorkerPerformance,
    pub load_stats: LoadBalancingStats,
    pub registered_at: DateTime<Utc>,
    /// 注册顺序，用于稳定的平局裁决
    pub registration_seq: u64,
}

impl WorkerDescriptor {
    pub fn capability_level(&self, name: &str) -> Option<u32> {
        self.enhanced_capabilities
            .iter()
            .find(|cap| cap.name == name)
            .map(|cap| cap.level)
    }
}

fn default_task_priority() -> u8 {
    2
}

/// 任务需求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequirements {
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// 1=低, 2=普通, 3=高, 4=紧急
    #[serde(default = "default_task_priority")]
    pub priority: u8,
    /// 不参与选择的Worker（例如刚崩溃的Worker）
    #[serde(default)]
    pub excluded_workers: Vec<String>,
}

impl TaskRequirements {
    pub fn new() -> Self {
        Self {
            capabilities: Vec::new(),
            priority: default_task_priority(),
            excluded_workers: Vec::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 4);
        self
    }

    pub fn excluding(mut self, worker_id: impl Into<String>) -> Self {
        self.excluded_workers.push(worker_id.into());
        self
    }

    pub fn is_excluded(&self, worker_id: &str) -> bool {
        self.excluded_workers.iter().any(|id| id == worker_id)
    }
}
