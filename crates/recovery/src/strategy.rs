use coordinator_core::models::{FailureType, RecoveryStrategy};

/// 根据故障类型和同一组件在统计窗口内的故障次数（含本次）选择恢复策略
pub fn determine_strategy(failure_type: FailureType, recent_failures: usize) -> RecoveryStrategy {
    match failure_type {
        FailureType::ConnectionFailure => match recent_failures {
            0..=2 => RecoveryStrategy::Retry,
            3..=4 => RecoveryStrategy::Escalate,
            _ => RecoveryStrategy::Abort,
        },
        FailureType::WorkerCrash => {
            if recent_failures < 2 {
                RecoveryStrategy::Reassign
            } else {
                RecoveryStrategy::Escalate
            }
        }
        // 资源冲突同步裁决
        FailureType::ResourceConflict => RecoveryStrategy::Retry,
        FailureType::CommunicationFailure => {
            if recent_failures < 5 {
                RecoveryStrategy::Retry
            } else {
                RecoveryStrategy::Escalate
            }
        }
        _ => RecoveryStrategy::Retry,
    }
}
