use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use coordinator_core::config::FileSystemConfig;

use crate::filesystem::SharedFileSystem;

/// 按协作空间ID管理共享文件系统
pub struct FileSpaces {
    config: FileSystemConfig,
    spaces: RwLock<HashMap<String, Arc<SharedFileSystem>>>,
}

impl FileSpaces {
    pub fn new(config: FileSystemConfig) -> Self {
        Self {
            config,
            spaces: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, space_id: &str) -> Arc<SharedFileSystem> {
        if let Some(space) = self.spaces.read().await.get(space_id) {
            return Arc::clone(space);
        }

        let mut spaces = self.spaces.write().await;
        Arc::clone(spaces.entry(space_id.to_string()).or_insert_with(|| {
            info!("创建协作空间文件系统: {}", space_id);
            Arc::new(SharedFileSystem::new(space_id, self.config.clone()))
        }))
    }

    pub async fn get(&self, space_id: &str) -> Option<Arc<SharedFileSystem>> {
        self.spaces.read().await.get(space_id).cloned()
    }

    pub async fn remove(&self, space_id: &str) -> bool {
        let removed = self.spaces.write().await.remove(space_id).is_some();
        if removed {
            info!("移除协作空间文件系统: {}", space_id);
        }
        removed
    }

    /// 空间ID列表（已排序）
    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.spaces.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 清理所有空间的过期文件锁
    pub async fn cleanup_expired_locks(&self) -> usize {
        let spaces: Vec<_> = self.spaces.read().await.values().cloned().collect();
        let mut cleaned = 0;
        for space in spaces {
            cleaned += space.cleanup_expired_locks().await;
        }
        cleaned
    }

    pub async fn clear(&self) {
        self.spaces.write().await.clear();
    }
}
