use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coordinator_core::{
    config::{RecoveryConfig, RegistryConfig, RouterConfig},
    models::{
        CollaborativeMessage, FailureType, ImpactLevel, MessageType, RecoveryStrategy, WorkerType,
    },
};
use coordinator_recovery::{ErrorRecoverySystem, RegistryProber};
use coordinator_registry::WorkerRegistry;
use coordinator_router::{MessageCallback, MessageRouter};
use coordinator_testing_utils::{
    fast_recovery_config, MessageBuilder, MockConnectionProber, MockMessageSender,
    MockWorkerDirectory, TestEnv, WorkerDescriptorBuilder, WorkerRegistrationBuilder,
};

fn with_mocks(
    config: RecoveryConfig,
) -> (ErrorRecoverySystem, MockMessageSender, MockConnectionProber) {
    let sender = MockMessageSender::new();
    let prober = MockConnectionProber::new();
    let recovery = ErrorRecoverySystem::new(
        config,
        Arc::new(MockWorkerDirectory::new()),
        Arc::new(sender.clone()),
        Arc::new(prober.clone()),
    );
    (recovery, sender, prober)
}

fn tasks(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn test_repeated_connection_failures_escalate() {
    let (recovery, _, _) = with_mocks(RecoveryConfig::default());

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(
            recovery
                .handle_connection_failure("storage-node", "连接被拒绝", HashMap::new())
                .await,
        );
    }
    assert_eq!(outcomes, vec![true, true, false, false]);

    let latest = &recovery.get_failure_history(1).await[0];
    assert_eq!(latest.recovery_strategy, Some(RecoveryStrategy::Escalate));
    assert_eq!(latest.impact_level, ImpactLevel::Critical);

    assert!(
        !recovery
            .handle_connection_failure("storage-node", "连接被拒绝", HashMap::new())
            .await
    );
    let latest = &recovery.get_failure_history(1).await[0];
    assert_eq!(latest.recovery_strategy, Some(RecoveryStrategy::Abort));

    let stats = recovery.get_recovery_statistics().await;
    assert_eq!(stats.total_failures, 5);
    assert_eq!(stats.failures_by_type["connection_failure"], 5);
    assert_eq!(stats.recoveries_by_strategy["escalate"], 2);

    let health = recovery.connection_health("storage-node").await.unwrap();
    assert!(!health.is_healthy);
    assert_eq!(health.consecutive_failures, 5);
}

#[tokio::test]
async fn test_connection_recovers_after_heartbeat() {
    let (recovery, _, _) = with_mocks(fast_recovery_config());

    assert!(
        recovery
            .handle_connection_failure("worker-7", "超时", HashMap::new())
            .await
    );
    assert_eq!(recovery.get_system_health().await.active_recoveries, 1);
    recovery.record_heartbeat("worker-7", 8.0).await;

    let recovered = TestEnv::wait_for(
        || async { recovery.get_recovery_statistics().await.successful_recoveries == 1 },
        Duration::from_secs(2),
    )
    .await;
    assert!(recovered);

    let record = &recovery.get_failure_history(1).await[0];
    assert!(record.is_resolved);
    assert!(record.resolved_at.is_some());
    assert_eq!(recovery.get_system_health().await.active_recoveries, 0);
}

#[tokio::test]
async fn test_connection_recovers_when_probe_succeeds() {
    let (recovery, _, prober) = with_mocks(fast_recovery_config());
    prober.set_reachable("worker-7", true);

    assert!(
        recovery
            .handle_connection_failure("worker-7", "超时", HashMap::new())
            .await
    );
    let recovered = TestEnv::wait_for(
        || async { recovery.get_recovery_statistics().await.successful_recoveries == 1 },
        Duration::from_secs(2),
    )
    .await;
    assert!(recovered);
    assert_eq!(prober.probe_count("worker-7"), 1);
    assert!(recovery.connection_health("worker-7").await.unwrap().is_healthy);
}

#[tokio::test]
async fn test_connection_recovery_exhausts_attempts() {
    let (recovery, _, prober) = with_mocks(fast_recovery_config());

    assert!(
        recovery
            .handle_connection_failure("worker-9", "超时", HashMap::new())
            .await
    );
    let exhausted = TestEnv::wait_for(
        || async { recovery.get_recovery_statistics().await.failed_recoveries == 1 },
        Duration::from_secs(2),
    )
    .await;
    assert!(exhausted);
    assert_eq!(prober.probe_count("worker-9"), 3);

    let record = &recovery.get_failure_history(1).await[0];
    assert!(!record.is_resolved);
    assert_eq!(record.recovery_attempts, 3);
}

#[tokio::test]
async fn test_worker_crash_reassigns_and_queues_remaining_tasks() {
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default()).unwrap());
    registry
        .register_specialized_worker("executor-1", WorkerRegistrationBuilder::executor().build())
        .await
        .unwrap();
    registry
        .register_specialized_worker(
            "executor-2",
            WorkerRegistrationBuilder::executor()
                .with_max_concurrent_tasks(1)
                .build(),
        )
        .await
        .unwrap();

    let recovery = ErrorRecoverySystem::new(
        fast_recovery_config(),
        registry.clone(),
        Arc::new(MockMessageSender::new()),
        Arc::new(RegistryProber::new(registry.clone())),
    );

    assert!(
        recovery
            .handle_worker_crash("executor-1", &tasks(&["t1", "t2", "t3"]), HashMap::new())
            .await
    );
    assert_eq!(recovery.task_assignment("t1").await.as_deref(), Some("executor-2"));
    assert!(recovery.task_assignment("t2").await.is_none());

    let pending = recovery.pending_reassignments().await;
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|p| p.worker_type == WorkerType::Executor));
    assert!(pending.iter().all(|p| p.original_worker == "executor-1"));

    let record = &recovery.get_failure_history(1).await[0];
    assert_eq!(record.failure_type, FailureType::WorkerCrash);
    assert_eq!(record.recovery_strategy, Some(RecoveryStrategy::Reassign));
    assert_eq!(record.context["reassigned_tasks"], 1);
    assert!(!recovery.connection_health("executor-1").await.unwrap().is_healthy);

    // 替代Worker空出槽位后，排队任务逐个重新分配
    registry
        .complete_task_assignment("executor-2", true, 2.0)
        .await
        .unwrap();
    assert_eq!(recovery.process_pending_reassignments().await, 1);
    assert_eq!(recovery.task_assignment("t2").await.as_deref(), Some("executor-2"));
    assert_eq!(recovery.pending_reassignments().await.len(), 1);
    assert_eq!(recovery.process_pending_reassignments().await, 0);
}

#[tokio::test]
async fn test_repeated_crash_escalates_but_still_reassigns() {
    let directory = MockWorkerDirectory::new();
    directory.add_worker(WorkerDescriptorBuilder::new("v1", WorkerType::Verifier).build());
    directory.add_worker(
        WorkerDescriptorBuilder::new("v2", WorkerType::Verifier)
            .with_load(0, 5)
            .build(),
    );
    let recovery = ErrorRecoverySystem::new(
        fast_recovery_config(),
        Arc::new(directory),
        Arc::new(MockMessageSender::new()),
        Arc::new(MockConnectionProber::new()),
    );

    assert!(recovery.handle_worker_crash("v1", &tasks(&["a"]), HashMap::new()).await);
    assert!(recovery.handle_worker_crash("v1", &tasks(&["b"]), HashMap::new()).await);

    let latest = &recovery.get_failure_history(1).await[0];
    assert_eq!(latest.recovery_strategy, Some(RecoveryStrategy::Escalate));
    assert_eq!(latest.impact_level, ImpactLevel::Critical);
    assert_eq!(recovery.task_assignment("b").await.as_deref(), Some("v2"));
}

#[tokio::test]
async fn test_crash_of_unknown_worker_reassigns_nothing() {
    let (recovery, _, _) = with_mocks(fast_recovery_config());
    assert!(recovery.handle_worker_crash("ghost", &tasks(&["t1"]), HashMap::new()).await);
    assert!(recovery.task_assignment("t1").await.is_none());
    assert!(recovery.pending_reassignments().await.is_empty());
}

#[tokio::test]
async fn test_resource_conflict_grants_highest_priority() {
    let directory = MockWorkerDirectory::new();
    directory.add_worker(
        WorkerDescriptorBuilder::new("low", WorkerType::Executor)
            .with_priority_score(5.0)
            .with_seq(0)
            .build(),
    );
    directory.add_worker(
        WorkerDescriptorBuilder::new("late", WorkerType::Planner)
            .with_priority_score(9.0)
            .with_seq(2)
            .build(),
    );
    directory.add_worker(
        WorkerDescriptorBuilder::new("early", WorkerType::Planner)
            .with_priority_score(9.0)
            .with_seq(1)
            .build(),
    );
    let recovery = ErrorRecoverySystem::new(
        fast_recovery_config(),
        Arc::new(directory),
        Arc::new(MockMessageSender::new()),
        Arc::new(MockConnectionProber::new()),
    );

    assert!(
        recovery
            .handle_resource_conflict(
                "shared/plan.md",
                &tasks(&["ghost", "low", "late", "early"]),
                HashMap::new(),
            )
            .await
    );
    assert_eq!(
        recovery.resource_holder("shared/plan.md").await.as_deref(),
        Some("early")
    );
    let record = &recovery.get_failure_history(1).await[0];
    assert!(record.is_resolved);
    assert_eq!(record.recovery_strategy, Some(RecoveryStrategy::Retry));

    // 全部未知时仍按输入顺序授予
    assert!(
        recovery
            .handle_resource_conflict("scratch", &tasks(&["x", "y"]), HashMap::new())
            .await
    );
    assert_eq!(recovery.resource_holder("scratch").await.as_deref(), Some("x"));

    assert!(!recovery.handle_resource_conflict("empty", &[], HashMap::new()).await);
    assert!(recovery.resource_holder("empty").await.is_none());
    assert_eq!(recovery.get_system_health().await.unresolved_resource_conflicts, 1);
}

#[tokio::test]
async fn test_communication_failure_retries_with_backoff_then_drops() {
    let sender = MockMessageSender::failing();
    let recovery = ErrorRecoverySystem::new(
        fast_recovery_config(),
        Arc::new(MockWorkerDirectory::new()),
        Arc::new(sender.clone()),
        Arc::new(MockConnectionProber::new()),
    );

    assert!(
        recovery
            .handle_communication_failure(
                "planner-1",
                "executor-1",
                MessageBuilder::new().with_type(MessageType::TaskDelegation).build(),
                "连接重置",
            )
            .await
    );
    assert_eq!(recovery.get_system_health().await.pending_message_retries, 1);

    recovery.start().await;
    let dropped = TestEnv::wait_for(
        || async { recovery.get_recovery_statistics().await.failed_recoveries == 1 },
        Duration::from_secs(2),
    )
    .await;
    assert!(dropped);
    assert_eq!(sender.attempt_count(), 3);
    assert_eq!(recovery.get_system_health().await.pending_message_retries, 0);

    let record = &recovery.get_failure_history(1).await[0];
    assert_eq!(record.component, "planner-1->executor-1");
    assert_eq!(record.context["message_type"], "task_delegation");
    recovery.shutdown().await;
}

#[tokio::test]
async fn test_communication_retry_delivered_through_router() {
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default()).unwrap());
    for (id, builder) in [
        ("planner-1", WorkerRegistrationBuilder::planner()),
        ("executor-1", WorkerRegistrationBuilder::executor()),
    ] {
        registry
            .register_specialized_worker(id, builder.build())
            .await
            .unwrap();
    }
    let router = Arc::new(MessageRouter::new(RouterConfig::default(), registry.clone()));
    let recovery = ErrorRecoverySystem::new(
        fast_recovery_config(),
        registry.clone(),
        router.clone(),
        Arc::new(RegistryProber::new(registry.clone())),
    );

    assert!(
        recovery
            .handle_communication_failure(
                "planner-1",
                "executor-1",
                MessageBuilder::new().build(),
                "订阅者不可用",
            )
            .await
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(recovery.process_message_retries().await, 1);

    assert_eq!(router.get_routing_statistics().await.successful_deliveries, 1);
    let stats = recovery.get_recovery_statistics().await;
    assert_eq!(stats.successful_recoveries, 1);
    assert!(recovery.get_failure_history(1).await[0].is_resolved);
}

#[tokio::test]
async fn test_queued_retry_is_not_resent() {
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default()).unwrap());
    for (id, builder) in [
        ("planner-1", WorkerRegistrationBuilder::planner()),
        ("executor-1", WorkerRegistrationBuilder::executor()),
    ] {
        registry
            .register_specialized_worker(id, builder.build())
            .await
            .unwrap();
    }
    let router = Arc::new(MessageRouter::new(
        RouterConfig {
            max_delivery_attempts: 100,
            ..RouterConfig::default()
        },
        registry.clone(),
    ));
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let callback: MessageCallback = Arc::new(move |_: &CollaborativeMessage| -> anyhow::Result<()> {
        *counter.lock().unwrap() += 1;
        Err(anyhow::anyhow!("订阅者忙"))
    });
    router.subscribe_to_messages("executor-1", callback).await;

    let recovery = ErrorRecoverySystem::new(
        fast_recovery_config(),
        registry.clone(),
        router.clone(),
        Arc::new(RegistryProber::new(registry.clone())),
    );
    assert!(
        recovery
            .handle_communication_failure(
                "planner-1",
                "executor-1",
                MessageBuilder::new().build(),
                "订阅者不可用",
            )
            .await
    );

    // 路由器接收后由路由器负责投递，恢复系统不再重复发送
    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(30)).await;
        recovery.process_message_retries().await;
    }

    assert_eq!(router.get_pending_messages("executor-1").await.len(), 1);
    assert_eq!(router.get_routing_statistics().await.total_messages, 1);
    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(recovery.get_system_health().await.pending_message_retries, 0);
    assert_eq!(recovery.get_recovery_statistics().await.successful_recoveries, 1);
    assert!(recovery.get_failure_history(1).await[0].is_resolved);
}

#[tokio::test]
async fn test_frequent_communication_failures_escalate() {
    let (recovery, _, _) = with_mocks(RecoveryConfig::default());
    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(
            recovery
                .handle_communication_failure("a", "b", MessageBuilder::new().build(), "超时")
                .await,
        );
    }
    assert_eq!(outcomes, vec![true, true, true, true, false]);
    assert_eq!(recovery.get_system_health().await.pending_message_retries, 4);
}

#[tokio::test]
async fn test_system_health_aggregates() {
    let (recovery, _, _) = with_mocks(RecoveryConfig::default());
    assert_eq!(recovery.get_system_health().await.overall_health_percentage, 100.0);

    recovery.record_heartbeat("a", 5.0).await;
    recovery.record_heartbeat("b", 5.0).await;
    recovery
        .handle_connection_failure("b", "超时", HashMap::new())
        .await;

    let health = recovery.get_system_health().await;
    assert_eq!(health.total_components, 2);
    assert_eq!(health.healthy_components, 1);
    assert_eq!(health.overall_health_percentage, 50.0);
    assert_eq!(health.total_failures, 1);
    assert_eq!(health.recent_failures, 1);
    assert_eq!(health.resolved_failures, 0);
    assert_eq!(health.active_recoveries, 1);
}

#[tokio::test]
async fn test_shutdown_stops_loops_and_clears_state() {
    let (recovery, _, _) = with_mocks(fast_recovery_config());
    recovery.start().await;
    recovery.record_heartbeat("a", 5.0).await;
    recovery
        .handle_connection_failure("a", "超时", HashMap::new())
        .await;
    recovery
        .handle_communication_failure("a", "b", MessageBuilder::new().build(), "超时")
        .await;

    tokio::time::timeout(Duration::from_secs(2), recovery.shutdown())
        .await
        .unwrap();

    let health = recovery.get_system_health().await;
    assert_eq!(health.total_failures, 0);
    assert_eq!(health.total_components, 0);
    assert_eq!(health.pending_message_retries, 0);
    assert_eq!(health.active_recoveries, 0);
    assert!(recovery.get_failure_history(10).await.is_empty());
}
