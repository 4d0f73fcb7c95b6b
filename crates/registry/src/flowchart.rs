use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use coordinator_core::models::{
    FlowchartStatus, InteractionPattern, InteractionType, WorkerFlowchart, WorkerType,
};

/// 生成一份处于草稿状态的协作流程图
pub fn plan_flowchart(
    objectives: &str,
    created_by: &str,
    planner_count: u32,
    executor_count: u32,
    verifier_count: u32,
) -> WorkerFlowchart {
    WorkerFlowchart {
        flowchart_id: Uuid::new_v4().to_string(),
        objectives: objectives.to_string(),
        planner_count,
        executor_count,
        verifier_count,
        interaction_patterns: interaction_patterns(),
        execution_order: execution_order(planner_count, executor_count, verifier_count),
        success_criteria: success_criteria(),
        created_by: created_by.to_string(),
        created_at: Utc::now(),
        status: FlowchartStatus::Draft,
    }
}

fn interaction_patterns() -> Vec<InteractionPattern> {
    vec![
        InteractionPattern {
            from_type: WorkerType::Planner,
            to_type: WorkerType::Executor,
            interaction: InteractionType::Delegate,
            description: "规划者向执行者委派任务".to_string(),
        },
        InteractionPattern {
            from_type: WorkerType::Executor,
            to_type: WorkerType::Verifier,
            interaction: InteractionType::Verify,
            description: "执行者请求验证者校验结果".to_string(),
        },
        InteractionPattern {
            from_type: WorkerType::Verifier,
            to_type: WorkerType::Planner,
            interaction: InteractionType::Report,
            description: "验证者向规划者汇报结果".to_string(),
        },
    ]
}

fn execution_order(planner_count: u32, executor_count: u32, verifier_count: u32) -> Vec<String> {
    let mut order = Vec::new();
    for (worker_type, count) in [
        (WorkerType::Planner, planner_count),
        (WorkerType::Executor, executor_count),
        (WorkerType::Verifier, verifier_count),
    ] {
        order.extend((1..=count).map(|i| format!("create_{}_{}", worker_type, i)));
    }

    order.extend(
        [
            "initialize_collaboration",
            "execute_tasks",
            "verify_results",
            "complete_objectives",
        ]
        .iter()
        .map(|step| step.to_string()),
    );
    order
}

fn success_criteria() -> HashMap<String, bool> {
    [
        "all_workers_created",
        "tasks_completed",
        "quality_verified",
        "objectives_met",
    ]
    .iter()
    .map(|criterion| (criterion.to_string(), true))
    .collect()
}
