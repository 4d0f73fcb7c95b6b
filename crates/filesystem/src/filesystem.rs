use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use coordinator_core::{config::FileSystemConfig, CoordinatorError, CoordinatorResult};

use crate::models::{FileHandle, FileLock, FilePermission, FileVersion, LockType};

struct FileEntry {
    handle: FileHandle,
    /// 按创建顺序
    versions: Vec<FileVersion>,
    /// 多个Read锁，或一个Write/Exclusive锁
    locks: Vec<FileLock>,
}

impl FileEntry {
    fn require(&self, worker_id: &str, permission: FilePermission) -> CoordinatorResult<()> {
        if self.handle.has_permission(worker_id, permission) {
            Ok(())
        } else {
            Err(CoordinatorError::PermissionDenied {
                worker_id: worker_id.to_string(),
                filename: self.handle.filename.clone(),
                permission: permission.to_string(),
            })
        }
    }

    fn drop_expired_locks(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.locks.len();
        self.locks.retain(|lock| !lock.is_expired(now));
        before - self.locks.len()
    }

    /// 其他Worker持有的未过期锁
    fn foreign_lock(&self, worker_id: &str, now: DateTime<Utc>) -> Option<&FileLock> {
        self.locks
            .iter()
            .find(|lock| lock.worker_id != worker_id && !lock.is_expired(now))
    }

    fn check_not_locked_by_others(&self, worker_id: &str, now: DateTime<Utc>) -> CoordinatorResult<()> {
        match self.foreign_lock(worker_id, now) {
            Some(lock) => Err(CoordinatorError::LockConflict {
                filename: self.handle.filename.clone(),
                holder: lock.worker_id.clone(),
            }),
            None => Ok(()),
        }
    }

    fn current_version(&self) -> Option<&FileVersion> {
        self.versions
            .iter()
            .find(|v| v.version_id == self.handle.current_version_id)
    }
}

/// 文件详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
    pub current_version_id: String,
    pub version_count: usize,
    pub size: usize,
    pub content_hash: String,
    pub is_locked: bool,
    pub locks: Vec<FileLock>,
    /// 仅对拥有Admin权限的调用者可见
    pub permissions: Option<BTreeMap<String, Vec<FilePermission>>>,
}

/// 文件系统统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemStats {
    pub space_id: String,
    pub total_files: usize,
    pub total_versions: usize,
    pub locked_files: usize,
    pub total_size_bytes: usize,
    pub active_locks: usize,
}

/// 协作空间内的共享文件系统
///
/// 每次写入生成一个新版本，历史版本可以按ID读取。文件锁是建议性的：
/// 更新和删除会检查其他Worker持有的未过期锁，过期的锁在访问时顺带清理。
pub struct SharedFileSystem {
    space_id: String,
    config: FileSystemConfig,
    files: RwLock<BTreeMap<String, FileEntry>>,
}

impl SharedFileSystem {
    pub fn new(space_id: impl Into<String>, config: FileSystemConfig) -> Self {
        Self {
            space_id: space_id.into(),
            config,
            files: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    /// 创建文件，生成第一个版本
    pub async fn create_file(
        &self,
        worker_id: &str,
        filename: &str,
        content: &str,
        comment: Option<&str>,
    ) -> CoordinatorResult<FileHandle> {
        if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(CoordinatorError::InvalidFilename {
                filename: filename.to_string(),
            });
        }

        let mut files = self.files.write().await;
        if files.contains_key(filename) {
            return Err(CoordinatorError::FileAlreadyExists {
                filename: filename.to_string(),
            });
        }

        let version = FileVersion::new(filename, content, worker_id, comment);
        let handle = FileHandle::new(&version);
        files.insert(
            filename.to_string(),
            FileEntry {
                handle: handle.clone(),
                versions: vec![version],
                locks: Vec::new(),
            },
        );

        info!("空间 {} 中创建文件 {} (创建者: {})", self.space_id, filename, worker_id);
        Ok(handle)
    }

    /// 读取文件内容，未指定版本时返回当前版本
    pub async fn read_file(
        &self,
        filename: &str,
        worker_id: Option<&str>,
        version_id: Option<&str>,
    ) -> CoordinatorResult<String> {
        let files = self.files.read().await;
        let entry = Self::entry(&files, filename)?;
        if let Some(worker_id) = worker_id {
            entry.require(worker_id, FilePermission::Read)?;
        }

        let target = version_id.unwrap_or(entry.handle.current_version_id.as_str());
        entry
            .versions
            .iter()
            .find(|v| v.version_id == target)
            .map(|v| v.content.clone())
            .ok_or_else(|| CoordinatorError::VersionNotFound {
                filename: filename.to_string(),
                version_id: target.to_string(),
            })
    }

    /// 写入新版本，返回新版本ID
    pub async fn update_file(
        &self,
        worker_id: &str,
        filename: &str,
        content: &str,
        comment: Option<&str>,
    ) -> CoordinatorResult<String> {
        let now = Utc::now();
        let mut files = self.files.write().await;
        let entry = Self::entry_mut(&mut files, filename)?;
        entry.require(worker_id, FilePermission::Write)?;
        entry.drop_expired_locks(now);
        entry.check_not_locked_by_others(worker_id, now)?;

        let version = FileVersion::new(filename, content, worker_id, comment);
        let version_id = version.version_id.clone();
        entry.handle.current_version_id = version_id.clone();
        entry.handle.last_modified_by = worker_id.to_string();
        entry.handle.last_modified_at = version.created_at;
        entry.versions.push(version);

        debug!(
            "文件 {} 更新到第 {} 个版本 (修改者: {})",
            filename,
            entry.versions.len(),
            worker_id
        );
        Ok(version_id)
    }

    /// 删除文件及其所有版本和锁
    pub async fn delete_file(&self, worker_id: &str, filename: &str) -> CoordinatorResult<()> {
        let now = Utc::now();
        let mut files = self.files.write().await;
        let entry = Self::entry(&files, filename)?;
        entry.require(worker_id, FilePermission::Delete)?;
        entry.check_not_locked_by_others(worker_id, now)?;

        files.remove(filename);
        info!("空间 {} 中删除文件 {} (操作者: {})", self.space_id, filename, worker_id);
        Ok(())
    }

    /// 尝试加锁
    ///
    /// 不等待：与其他Worker的未过期锁冲突时返回 `Ok(false)`。
    /// `timeout_seconds` 为 `None` 时使用默认超时，为 `Some(0)` 时永不过期，
    /// 超出可表示的时间范围时返回 `InvalidLockTimeout`。
    pub async fn lock_file(
        &self,
        worker_id: &str,
        filename: &str,
        lock_type: LockType,
        timeout_seconds: Option<u64>,
    ) -> CoordinatorResult<bool> {
        let now = Utc::now();
        let mut files = self.files.write().await;
        let entry = Self::entry_mut(&mut files, filename)?;
        entry.require(worker_id, lock_type.required_permission())?;
        let timeout = timeout_seconds.unwrap_or(self.config.default_lock_timeout_seconds);
        let expires_at = lock_expiry(now, timeout)?;
        entry.drop_expired_locks(now);

        if let Some(own) = entry.locks.iter().find(|lock| lock.worker_id == worker_id) {
            return Ok(own.lock_type == LockType::Read && lock_type == LockType::Read);
        }
        let compatible = entry
            .locks
            .iter()
            .all(|lock| lock.lock_type == LockType::Read && lock_type == LockType::Read);
        if !compatible {
            debug!("Worker {} 对文件 {} 加锁冲突", worker_id, filename);
            return Ok(false);
        }

        entry
            .locks
            .push(FileLock::new(filename, worker_id, lock_type, expires_at));

        debug!("Worker {} 获得文件 {} 的 {:?} 锁", worker_id, filename, lock_type);
        Ok(true)
    }

    /// 释放锁
    pub async fn unlock_file(&self, worker_id: &str, filename: &str) -> CoordinatorResult<()> {
        let now = Utc::now();
        let mut files = self.files.write().await;
        let entry = Self::entry_mut(&mut files, filename)?;

        if let Some(index) = entry.locks.iter().position(|lock| lock.worker_id == worker_id) {
            let lock = entry.locks.remove(index);
            entry.drop_expired_locks(now);
            if lock.is_expired(now) {
                return Err(CoordinatorError::Expired {
                    resource: format!("{} 的文件锁", filename),
                });
            }
            debug!("Worker {} 释放文件 {} 的锁", worker_id, filename);
            return Ok(());
        }

        entry.drop_expired_locks(now);
        match entry.locks.first() {
            Some(lock) => Err(CoordinatorError::LockConflict {
                filename: filename.to_string(),
                holder: lock.worker_id.clone(),
            }),
            None => Err(CoordinatorError::FileNotLocked {
                filename: filename.to_string(),
            }),
        }
    }

    pub async fn grant_permission(
        &self,
        admin_worker_id: &str,
        filename: &str,
        target_worker_id: &str,
        permission: FilePermission,
    ) -> CoordinatorResult<()> {
        let mut files = self.files.write().await;
        let entry = Self::entry_mut(&mut files, filename)?;
        entry.require(admin_worker_id, FilePermission::Admin)?;
        entry.handle.grant(target_worker_id, permission);

        info!(
            "{} 授予 {} 文件 {} 的 {} 权限",
            admin_worker_id, target_worker_id, filename, permission
        );
        Ok(())
    }

    pub async fn revoke_permission(
        &self,
        admin_worker_id: &str,
        filename: &str,
        target_worker_id: &str,
        permission: FilePermission,
    ) -> CoordinatorResult<()> {
        let mut files = self.files.write().await;
        let entry = Self::entry_mut(&mut files, filename)?;
        entry.require(admin_worker_id, FilePermission::Admin)?;
        entry.handle.revoke(target_worker_id, permission);

        info!(
            "{} 撤销 {} 文件 {} 的 {} 权限",
            admin_worker_id, target_worker_id, filename, permission
        );
        Ok(())
    }

    /// 文件名列表；指定Worker时只列出其可读的文件
    pub async fn list_files(&self, worker_id: Option<&str>) -> Vec<String> {
        let files = self.files.read().await;
        files
            .values()
            .filter(|entry| {
                worker_id
                    .map(|id| entry.handle.has_permission(id, FilePermission::Read))
                    .unwrap_or(true)
            })
            .map(|entry| entry.handle.filename.clone())
            .collect()
    }

    /// 版本历史，最新的在前
    pub async fn get_file_history(
        &self,
        filename: &str,
        worker_id: Option<&str>,
    ) -> CoordinatorResult<Vec<FileVersion>> {
        let files = self.files.read().await;
        let entry = Self::entry(&files, filename)?;
        if let Some(worker_id) = worker_id {
            entry.require(worker_id, FilePermission::Read)?;
        }
        Ok(entry.versions.iter().rev().cloned().collect())
    }

    pub async fn get_file_info(
        &self,
        filename: &str,
        worker_id: Option<&str>,
    ) -> CoordinatorResult<FileInfo> {
        let now = Utc::now();
        let files = self.files.read().await;
        let entry = Self::entry(&files, filename)?;
        if let Some(worker_id) = worker_id {
            entry.require(worker_id, FilePermission::Read)?;
        }

        let locks: Vec<FileLock> = entry
            .locks
            .iter()
            .filter(|lock| !lock.is_expired(now))
            .cloned()
            .collect();
        let permissions = worker_id
            .filter(|id| entry.handle.has_permission(id, FilePermission::Admin))
            .map(|_| {
                entry
                    .handle
                    .permissions
                    .iter()
                    .map(|(id, perms)| {
                        let mut perms: Vec<_> = perms.iter().copied().collect();
                        perms.sort();
                        (id.clone(), perms)
                    })
                    .collect::<BTreeMap<_, _>>()
            });
        let current = entry.current_version();

        Ok(FileInfo {
            filename: filename.to_string(),
            created_by: entry.handle.created_by.clone(),
            created_at: entry.handle.created_at,
            last_modified_by: entry.handle.last_modified_by.clone(),
            last_modified_at: entry.handle.last_modified_at,
            current_version_id: entry.handle.current_version_id.clone(),
            version_count: entry.versions.len(),
            size: current.map(|v| v.size).unwrap_or(0),
            content_hash: current.map(|v| v.content_hash.clone()).unwrap_or_default(),
            is_locked: !locks.is_empty(),
            locks,
            permissions,
        })
    }

    /// 清理所有过期锁，返回清理数量
    pub async fn cleanup_expired_locks(&self) -> usize {
        let now = Utc::now();
        let mut files = self.files.write().await;
        let cleaned: usize = files
            .values_mut()
            .map(|entry| entry.drop_expired_locks(now))
            .sum();
        if cleaned > 0 {
            debug!("空间 {} 清理过期文件锁 {} 个", self.space_id, cleaned);
        }
        cleaned
    }

    pub async fn get_stats(&self) -> FileSystemStats {
        let now = Utc::now();
        let files = self.files.read().await;
        let live_locks = |entry: &FileEntry| entry.locks.iter().filter(|l| !l.is_expired(now)).count();

        FileSystemStats {
            space_id: self.space_id.clone(),
            total_files: files.len(),
            total_versions: files.values().map(|e| e.versions.len()).sum(),
            locked_files: files.values().filter(|e| live_locks(e) > 0).count(),
            total_size_bytes: files
                .values()
                .flat_map(|e| e.versions.iter())
                .map(|v| v.size)
                .sum(),
            active_locks: files.values().map(live_locks).sum(),
        }
    }

    fn entry<'a>(
        files: &'a BTreeMap<String, FileEntry>,
        filename: &str,
    ) -> CoordinatorResult<&'a FileEntry> {
        files.get(filename).ok_or_else(|| CoordinatorError::FileNotFound {
            filename: filename.to_string(),
        })
    }

    fn entry_mut<'a>(
        files: &'a mut BTreeMap<String, FileEntry>,
        filename: &str,
    ) -> CoordinatorResult<&'a mut FileEntry> {
        files.get_mut(filename).ok_or_else(|| CoordinatorError::FileNotFound {
            filename: filename.to_string(),
        })
    }
}

/// 锁的过期时间，0 表示永不过期
fn lock_expiry(now: DateTime<Utc>, timeout_seconds: u64) -> CoordinatorResult<Option<DateTime<Utc>>> {
    if timeout_seconds == 0 {
        return Ok(None);
    }
    i64::try_from(timeout_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(Some)
        .ok_or(CoordinatorError::InvalidLockTimeout {
            seconds: timeout_seconds,
        })
}
