use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::worker::WorkerType;

/// 流程图状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlowchartStatus {
    Draft,
    Active,
    Completed,
}

/// Worker之间的交互方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum InteractionType {
    Delegate,
    Verify,
    Collaborate,
    Report,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionPattern {
    pub from_type: WorkerType,
    pub to_type: WorkerType,
    pub interaction: InteractionType,
    pub description: String,
}

/// 多Worker协作执行计划
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerFlowchart {
    pub flowchart_id: String,
    pub objectives: String,
    pub planner_count: u32,
    pub executor_count: u32,
    pub verifier_count: u32,
    pub interaction_patterns: Vec<InteractionPattern>,
    pub execution_order: Vec<String>,
    pub success_criteria: HashMap<String, bool>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: FlowchartStatus,
}

impl WorkerFlowchart {
    pub fn is_active(&self) -> bool {
        self.status == FlowchartStatus::Active
    }

    pub fn total_workers(&self) -> u32 {
        self.planner_count + self.executor_count + self.verifier_count
    }
}
