use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// 文件访问权限
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FilePermission {
    Read,
    Write,
    Delete,
    Admin,
}

impl FilePermission {
    pub fn all() -> [FilePermission; 4] {
        [
            FilePermission::Read,
            FilePermission::Write,
            FilePermission::Delete,
            FilePermission::Admin,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilePermission::Read => "read",
            FilePermission::Write => "write",
            FilePermission::Delete => "delete",
            FilePermission::Admin => "admin",
        }
    }
}

impl fmt::Display for FilePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 文件锁类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    Read,
    Write,
    Exclusive,
}

impl LockType {
    /// 加锁所需的权限
    pub fn required_permission(&self) -> FilePermission {
        match self {
            LockType::Read => FilePermission::Read,
            LockType::Write | LockType::Exclusive => FilePermission::Write,
        }
    }
}

/// 文件的一个版本，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileVersion {
    pub version_id: String,
    pub filename: String,
    pub content: String,
    /// 内容的SHA-256十六进制摘要
    pub content_hash: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// UTF-8字节数
    pub size: usize,
    pub comment: Option<String>,
}

impl FileVersion {
    pub fn new(filename: &str, content: &str, created_by: &str, comment: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());

        Self {
            version_id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            content: content.to_string(),
            content_hash: hex::encode(hasher.finalize()),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            size: content.len(),
            comment: comment.map(str::to_string),
        }
    }
}

/// 文件锁
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileLock {
    pub lock_id: String,
    pub filename: String,
    pub worker_id: String,
    pub lock_type: LockType,
    pub acquired_at: DateTime<Utc>,
    /// `None` 表示永不过期
    pub expires_at: Option<DateTime<Utc>>,
}

impl FileLock {
    pub fn new(
        filename: &str,
        worker_id: &str,
        lock_type: LockType,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            lock_id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            worker_id: worker_id.to_string(),
            lock_type,
            acquired_at: Utc::now(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }
}

/// 文件句柄：元数据和访问控制表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHandle {
    pub filename: String,
    pub current_version_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_by: String,
    pub last_modified_at: DateTime<Utc>,
    pub permissions: HashMap<String, HashSet<FilePermission>>,
}

impl FileHandle {
    /// 创建者拥有全部权限
    pub fn new(version: &FileVersion) -> Self {
        let permissions = HashMap::from([(
            version.created_by.clone(),
            FilePermission::all().into_iter().collect(),
        )]);

        Self {
            filename: version.filename.clone(),
            current_version_id: version.version_id.clone(),
            created_by: version.created_by.clone(),
            created_at: version.created_at,
            last_modified_by: version.created_by.clone(),
            last_modified_at: version.created_at,
            permissions,
        }
    }

    /// Admin隐含所有权限
    pub fn has_permission(&self, worker_id: &str, permission: FilePermission) -> bool {
        self.permissions
            .get(worker_id)
            .map(|perms| perms.contains(&permission) || perms.contains(&FilePermission::Admin))
            .unwrap_or(false)
    }

    pub fn grant(&mut self, worker_id: &str, permission: FilePermission) {
        self.permissions
            .entry(worker_id.to_string())
            .or_default()
            .insert(permission);
    }

    pub fn revoke(&mut self, worker_id: &str, permission: FilePermission) {
        if let Some(perms) = self.permissions.get_mut(worker_id) {
            perms.remove(&permission);
            if perms.is_empty() {
                self.permissions.remove(worker_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_version_hash_and_size() {
        let version = FileVersion::new("notes.txt", "héllo", "worker-a", Some("初稿"));
        assert_eq!(version.size, 6);
        assert_eq!(version.content_hash.len(), 64);
        assert_eq!(
            FileVersion::new("notes.txt", "", "worker-a", None).content_hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_admin_implies_everything() {
        let version = FileVersion::new("notes.txt", "v1", "worker-a", None);
        let mut handle = FileHandle::new(&version);
        assert!(handle.has_permission("worker-a", FilePermission::Delete));
        assert!(!handle.has_permission("worker-b", FilePermission::Read));

        handle.grant("worker-b", FilePermission::Admin);
        assert!(handle.has_permission("worker-b", FilePermission::Write));

        handle.revoke("worker-b", FilePermission::Admin);
        assert!(!handle.permissions.contains_key("worker-b"));
    }

    #[test]
    fn test_lock_expiry() {
        let now = Utc::now();
        let lock = FileLock::new("a", "w", LockType::Read, Some(now + Duration::seconds(5)));
        assert!(!lock.is_expired(now));
        assert!(lock.is_expired(now + Duration::seconds(6)));

        let forever = FileLock::new("a", "w", LockType::Exclusive, None);
        assert!(!forever.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn test_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&LockType::Exclusive).unwrap(), "\"exclusive\"");
        let perm: FilePermission = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(perm, FilePermission::Admin);
        assert_eq!(perm.to_string(), "admin");
    }
}
