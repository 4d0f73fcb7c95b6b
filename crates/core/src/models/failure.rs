use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 故障分类
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ConnectionFailure,
    WorkerCrash,
    TaskTimeout,
    ResourceConflict,
    CommunicationFailure,
    ValidationFailure,
    SystemOverload,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::ConnectionFailure => "connection_failure",
            FailureType::WorkerCrash => "worker_crash",
            FailureType::TaskTimeout => "task_timeout",
            FailureType::ResourceConflict => "resource_conflict",
            FailureType::CommunicationFailure => "communication_failure",
            FailureType::ValidationFailure => "validation_failure",
            FailureType::SystemOverload => "system_overload",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStrategy {
    Retry,
    Reassign,
    Escalate,
    Abort,
    Ignore,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::Reassign => "reassign",
            RecoveryStrategy::Escalate => "escalate",
            RecoveryStrategy::Abort => "abort",
            RecoveryStrategy::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// 故障记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub failure_id: String,
    pub failure_type: FailureType,
    pub component: String,
    pub description: String,
    pub context: HashMap<String, serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub recovery_strategy: Option<RecoveryStrategy>,
    pub recovery_attempts: u32,
    pub max_recovery_attempts: u32,
    pub is_resolved: bool,
    pub impact_level: ImpactLevel,
}

impl FailureRecord {
    pub fn new(
        failure_type: FailureType,
        component: &str,
        description: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
        max_recovery_attempts: u32,
    ) -> Self {
        let impact_level = match failure_type {
            FailureType::WorkerCrash => ImpactLevel::High,
            FailureType::ConnectionFailure | FailureType::CommunicationFailure => ImpactLevel::Medium,
            FailureType::SystemOverload => ImpactLevel::High,
            _ => ImpactLevel::Low,
        };

        Self {
            failure_id: Uuid::new_v4().to_string(),
            failure_type,
            component: component.to_string(),
            description: description.into(),
            context,
            occurred_at: Utc::now(),
            resolved_at: None,
            recovery_strategy: None,
            recovery_attempts: 0,
            max_recovery_attempts,
            is_resolved: false,
            impact_level,
        }
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.is_resolved = true;
        self.resolved_at = Some(now);
    }

    /// 从发生到解决的耗时（秒）
    pub fn resolution_seconds(&self) -> Option<f64> {
        self.resolved_at
            .map(|at| (at - self.occurred_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// 组件连接健康状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionHealth {
    pub component_id: String,
    pub last_heartbeat: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub is_healthy: bool,
    /// 连接质量 [0, 1]
    pub connection_quality: f64,
    pub response_time_ms: f64,
}

impl ConnectionHealth {
    pub fn new(component_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            component_id: component_id.to_string(),
            last_heartbeat: now,
            consecutive_failures: 0,
            total_failures: 0,
            is_healthy: true,
            connection_quality: 1.0,
            response_time_ms: 0.0,
        }
    }

    pub fn record_success(&mut self, response_time_ms: f64, now: DateTime<Utc>) {
        self.last_heartbeat = now;
        self.consecutive_failures = 0;
        self.is_healthy = true;
        self.connection_quality = (self.connection_quality + 0.1).min(1.0);
        self.response_time_ms = response_time_ms;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.total_failures += 1;
        self.is_healthy = false;
        self.connection_quality = (self.connection_quality - 0.2).max(0.0);
    }
}
