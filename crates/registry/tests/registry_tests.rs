use coordinator_core::{
    config::RegistryConfig,
    models::{FlowchartStatus, TaskRequirements, WorkerType},
    traits::WorkerDirectory,
    CoordinatorError,
};
use coordinator_registry::WorkerRegistry;
use coordinator_testing_utils::WorkerRegistrationBuilder;

fn registry() -> WorkerRegistry {
    WorkerRegistry::new(RegistryConfig::default()).unwrap()
}

#[tokio::test]
async fn test_prefers_higher_capability_level_at_equal_load() {
    let registry = registry();
    registry
        .register_specialized_worker(
            "executor-2",
            WorkerRegistrationBuilder::executor()
                .with_capability("coding", 6)
                .build(),
        )
        .await
        .unwrap();
    registry
        .register_specialized_worker(
            "executor-1",
            WorkerRegistrationBuilder::executor()
                .with_capability("coding", 8)
                .build(),
        )
        .await
        .unwrap();

    let selected = registry
        .get_load_balanced_worker(
            WorkerType::Executor,
            &TaskRequirements::new().with_capabilities(["coding"]),
        )
        .await
        .unwrap();
    assert_eq!(selected.worker_id, "executor-1");
    assert_eq!(selected.load_stats.current_load, 1);
}

#[tokio::test]
async fn test_saturated_workers_are_never_selected() {
    let registry = registry();
    registry
        .register_specialized_worker(
            "e1",
            WorkerRegistrationBuilder::executor()
                .with_max_concurrent_tasks(2)
                .build(),
        )
        .await
        .unwrap();

    let requirements = TaskRequirements::new();
    assert!(registry
        .get_load_balanced_worker(WorkerType::Executor, &requirements)
        .await
        .is_some());
    assert!(registry
        .get_load_balanced_worker(WorkerType::Executor, &requirements)
        .await
        .is_some());
    assert!(registry
        .get_load_balanced_worker(WorkerType::Executor, &requirements)
        .await
        .is_none());

    assert!(registry
        .find_workers_by_type(WorkerType::Executor, true)
        .await
        .is_empty());
    assert_eq!(
        registry
            .find_workers_by_type(WorkerType::Executor, false)
            .await
            .len(),
        1
    );

    let e1 = registry.get_worker("e1").await.unwrap();
    assert!(e1.load_stats.current_load <= e1.load_stats.max_concurrent_tasks);
}

#[tokio::test]
async fn test_no_worker_of_type_returns_none() {
    let registry = registry();
    registry
        .register_specialized_worker("p1", WorkerRegistrationBuilder::planner().build())
        .await
        .unwrap();

    assert!(registry
        .get_load_balanced_worker(WorkerType::Verifier, &TaskRequirements::new())
        .await
        .is_none());
}

#[tokio::test]
async fn test_completion_updates_load_and_success_rate() {
    let registry = registry();
    registry
        .register_specialized_worker("e1", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();

    // 无在途任务时完成不会让负载变为负数
    registry.complete_task_assignment("e1", false, 3.0).await.unwrap();
    let e1 = registry.get_worker("e1").await.unwrap();
    assert_eq!(e1.load_stats.current_load, 0);
    assert_eq!(e1.performance.tasks_completed, 1);
    assert!((e1.performance.success_rate - 0.9).abs() < 1e-9);

    registry
        .get_load_balanced_worker(WorkerType::Executor, &TaskRequirements::new())
        .await
        .unwrap();
    registry.complete_task_assignment("e1", true, 1.0).await.unwrap();
    let e1 = registry.get_worker("e1").await.unwrap();
    assert_eq!(e1.load_stats.current_load, 0);
    assert!((e1.performance.success_rate - 0.91).abs() < 1e-9);

    let stats = registry.get_registry_statistics().await;
    assert_eq!(stats.total_tasks_assigned, 1);
    assert_eq!(stats.successful_assignments, 1);
    assert_eq!(stats.failed_assignments, 1);
}

#[tokio::test]
async fn test_flowchart_lifecycle() {
    let registry = registry();
    let flowchart = registry
        .create_worker_flowchart("发布新版本", "planner-1", 1, 2, 1)
        .await;
    assert_eq!(flowchart.status, FlowchartStatus::Draft);

    assert!(!registry.activate_flowchart("unknown").await);
    assert!(!registry.complete_flowchart(&flowchart.flowchart_id).await);

    assert!(registry.activate_flowchart(&flowchart.flowchart_id).await);
    assert!(!registry.activate_flowchart(&flowchart.flowchart_id).await);
    assert_eq!(registry.get_active_flowcharts().await.len(), 1);
    assert_eq!(registry.get_registry_statistics().await.active_flowcharts, 1);

    assert!(registry.complete_flowchart(&flowchart.flowchart_id).await);
    assert!(registry.get_active_flowcharts().await.is_empty());
    assert!(!registry.activate_flowchart(&flowchart.flowchart_id).await);

    let stored = registry.get_flowchart(&flowchart.flowchart_id).await.unwrap();
    assert_eq!(stored.status, FlowchartStatus::Completed);

    let missing = registry.get_flowchart("missing").await.unwrap_err();
    assert!(matches!(missing, CoordinatorError::FlowchartNotFound { .. }));
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_cleanup_inactive_workers() {
    let registry = registry();
    registry
        .register_specialized_worker("e1", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();
    registry
        .register_specialized_worker("v1", WorkerRegistrationBuilder::verifier().build())
        .await
        .unwrap();

    assert_eq!(registry.cleanup_inactive_workers(30).await, 0);

    // 负阈值使截止时间落在未来，所有Worker都视为不活跃
    assert_eq!(registry.cleanup_inactive_workers(-1).await, 2);
    assert!(registry.get_worker("e1").await.is_none());
    assert!(registry
        .find_workers_by_type(WorkerType::Verifier, false)
        .await
        .is_empty());
    assert!(!registry.is_registered("v1").await);

    registry
        .register_specialized_worker("e2", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();
    assert_eq!(registry.cleanup_inactive_workers(i64::MAX).await, 0);
    assert_eq!(registry.cleanup_inactive_workers(i64::MIN).await, 1);
}

#[tokio::test]
async fn test_statistics_by_type() {
    let registry = registry();
    registry
        .register_specialized_worker("p1", WorkerRegistrationBuilder::planner().build())
        .await
        .unwrap();
    registry
        .register_specialized_worker("e1", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();
    registry
        .register_specialized_worker("e2", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();

    let stats = registry.get_registry_statistics().await;
    assert_eq!(stats.total_workers, 3);
    assert_eq!(stats.workers_by_type["executor"], 2);
    assert_eq!(stats.workers_by_type["planner"], 1);
    assert_eq!(stats.workers_by_type["verifier"], 0);
    assert_eq!(stats.total_capacity, 9);
    assert_eq!(stats.average_success_rate, 1.0);
    assert_eq!(stats.workers[0].worker_id, "p1");
}

#[tokio::test]
async fn test_directory_view() {
    let registry = registry();
    registry
        .register_specialized_worker("p1", WorkerRegistrationBuilder::planner().build())
        .await
        .unwrap();
    registry
        .register_specialized_worker("e1", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();

    assert_eq!(registry.active_worker_ids(Some("p1")).await, vec!["e1"]);
    assert_eq!(registry.worker_type("e1").await, Some(WorkerType::Executor));
    let (priority, seq) = registry.priority_rank("p1").await.unwrap();
    assert_eq!(priority, 8.0);
    assert_eq!(seq, 0);
    assert!(registry.priority_rank("ghost").await.is_none());

    assert!(registry.unregister_worker("p1").await);
    assert!(!registry.unregister_worker("p1").await);

    registry.shutdown().await;
    assert!(registry.get_active_workers(None).await.is_empty());
}

#[tokio::test]
async fn test_record_activity_refreshes_last_active() {
    let registry = registry();
    registry
        .register_specialized_worker("e1", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();
    let before = registry.get_worker("e1").await.unwrap().performance.last_active;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(registry.record_activity("e1").await);
    assert!(!registry.record_activity("ghost").await);

    let after = registry.get_worker("e1").await.unwrap().performance.last_active;
    assert!(after > before);
}
