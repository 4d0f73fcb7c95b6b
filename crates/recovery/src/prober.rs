use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use coordinator_core::traits::{ConnectionProber, WorkerDirectory};

/// 以Worker注册表为准的连接探测：已注册即视为可达
pub struct RegistryProber {
    directory: Arc<dyn WorkerDirectory>,
}

impl RegistryProber {
    pub fn new(directory: Arc<dyn WorkerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ConnectionProber for RegistryProber {
    async fn probe(&self, component_id: &str, _failed_at: DateTime<Utc>) -> bool {
        let reachable = self.directory.is_registered(component_id).await;
        debug!("探测组件 {}: {}", component_id, if reachable { "可达" } else { "不可达" });
        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_core::models::WorkerType;
    use coordinator_testing_utils::{MockWorkerDirectory, WorkerDescriptorBuilder};

    #[tokio::test]
    async fn test_registered_worker_is_reachable() {
        let directory = MockWorkerDirectory::new();
        directory.add_worker(WorkerDescriptorBuilder::new("e1", WorkerType::Executor).build());
        let prober = RegistryProber::new(Arc::new(directory));

        assert!(prober.probe("e1", Utc::now()).await);
        assert!(!prober.probe("ghost", Utc::now()).await);
    }
}
