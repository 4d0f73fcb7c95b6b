use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use coordinator_core::{join_with_timeout, AppConfig, ShutdownManager};
use coordinator_filesystem::FileSpaces;
use coordinator_recovery::{ErrorRecoverySystem, RegistryProber, SystemHealth};
use coordinator_registry::{RegistryStatistics, WorkerRegistry};
use coordinator_router::{MessageRouter, RoutingStatistics};

/// 服务器状态快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub running: bool,
    pub registry: RegistryStatistics,
    pub routing: RoutingStatistics,
    pub health: SystemHealth,
    pub file_spaces: Vec<String>,
}

/// 协作服务器
///
/// 组合根：按 注册表 → 路由器 → 故障恢复 → 文件空间 的顺序构造组件，
/// 并通过接口把注册表和路由器注入给依赖它们的组件。
pub struct CollaborativeServer {
    config: AppConfig,
    registry: Arc<WorkerRegistry>,
    router: Arc<MessageRouter>,
    recovery: ErrorRecoverySystem,
    file_spaces: Arc<FileSpaces>,
    shutdown: ShutdownManager,
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl CollaborativeServer {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate().context("配置验证失败")?;
        info!("初始化协作服务器");

        let registry = Arc::new(
            WorkerRegistry::new(config.registry.clone()).context("创建Worker注册表失败")?,
        );
        let router = Arc::new(MessageRouter::new(config.router.clone(), registry.clone()));
        let recovery = ErrorRecoverySystem::new(
            config.recovery.clone(),
            registry.clone(),
            router.clone(),
            Arc::new(RegistryProber::new(registry.clone())),
        );
        let file_spaces = Arc::new(FileSpaces::new(config.filesystem.clone()));

        Ok(Self {
            config,
            registry,
            router,
            recovery,
            file_spaces,
            shutdown: ShutdownManager::new(),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn recovery(&self) -> &ErrorRecoverySystem {
        &self.recovery
    }

    pub fn file_spaces(&self) -> &Arc<FileSpaces> {
        &self.file_spaces
    }

    /// 启动后台循环：消息处理、故障恢复、心跳监控和维护
    pub async fn start(&self) -> Result<()> {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            return Err(anyhow::anyhow!("协作服务器已经在运行"));
        }
        if self.shutdown.is_shutdown().await {
            return Err(anyhow::anyhow!("协作服务器已关闭，不能再次启动"));
        }

        handles.push(("message_router", self.router.start(&self.shutdown).await));
        self.recovery.start().await;

        let shutdown_rx = self.shutdown.subscribe().await;
        handles.push(("maintenance", tokio::spawn(self.maintenance_loop(shutdown_rx))));

        info!("协作服务器已启动");
        Ok(())
    }

    fn maintenance_loop(
        &self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let registry = Arc::clone(&self.registry);
        let router = Arc::clone(&self.router);
        let file_spaces = Arc::clone(&self.file_spaces);
        let interval = self.config.server.maintenance_interval();
        let auto_cleanup = self.config.server.auto_cleanup;

        async move {
            info!("启动维护循环，间隔: {:?}", interval);
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if auto_cleanup {
                            let removed = registry.cleanup_with_configured_threshold().await;
                            if removed > 0 {
                                info!("清理不活跃Worker {} 个", removed);
                            }
                        }
                        let processed = router.process_pending_messages().await;
                        let unlocked = file_spaces.cleanup_expired_locks().await;
                        debug!("维护完成: 处理消息 {} 条, 清理文件锁 {} 个", processed, unlocked);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("收到关闭信号，退出维护循环");
                        break;
                    }
                }
            }
        }
    }

    /// 停止服务器，按构造的逆序关闭组件
    pub async fn stop(&self) {
        info!("开始关闭协作服务器...");
        self.shutdown.shutdown().await;

        let limit = self.config.recovery.shutdown_timeout();
        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for (name, handle) in handles {
            join_with_timeout(name, handle, limit).await;
        }

        self.file_spaces.clear().await;
        self.recovery.shutdown().await;
        self.router.shutdown().await;
        self.registry.shutdown().await;
        info!("协作服务器已关闭");
    }

    pub async fn is_running(&self) -> bool {
        !self.handles.lock().await.is_empty()
    }

    /// 汇总注册表统计、路由统计和系统健康状态
    pub async fn status(&self) -> ServerStatus {
        ServerStatus {
            running: self.is_running().await,
            registry: self.registry.get_registry_statistics().await,
            routing: self.router.get_routing_statistics().await,
            health: self.recovery.get_system_health().await,
            file_spaces: self.file_spaces.list().await,
        }
    }
}
