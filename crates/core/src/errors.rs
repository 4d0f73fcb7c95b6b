use thiserror::Error;

/// 协调内核错误类型定义
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("无效的Worker类型: {value}，支持的类型: planner, executor, verifier")]
    InvalidWorkerType { value: String },

    #[error("Worker {worker_id} 已注册为 {registered}，不能变更为 {requested}")]
    WorkerTypeChanged {
        worker_id: String,
        registered: String,
        requested: String,
    },

    #[error("无效的Worker ID: from={from}, to={to}")]
    InvalidWorkerIds { from: String, to: String },

    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("流程图未找到: {id}")]
    FlowchartNotFound { id: String },

    #[error("文件未找到: {filename}")]
    FileNotFound { filename: String },

    #[error("文件 {filename} 的版本未找到: {version_id}")]
    VersionNotFound {
        filename: String,
        version_id: String,
    },

    #[error("文件已存在: {filename}")]
    FileAlreadyExists { filename: String },

    #[error("无效的文件名: '{filename}'")]
    InvalidFilename { filename: String },

    #[error("Worker {worker_id} 没有文件 {filename} 的 {permission} 权限")]
    PermissionDenied {
        worker_id: String,
        filename: String,
        permission: String,
    },

    #[error("文件 {filename} 已被Worker {holder} 锁定")]
    LockConflict { filename: String, holder: String },

    #[error("文件未加锁: {filename}")]
    FileNotLocked { filename: String },

    #[error("无效的锁超时: {seconds} 秒")]
    InvalidLockTimeout { seconds: u64 },

    #[error("已过期: {resource}")]
    Expired { resource: String },

    #[error("Worker {worker_id} 的消息队列已满 (容量: {capacity})")]
    CapacityExceeded { worker_id: String, capacity: usize },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// 是否属于"未找到"类错误（文件、版本、流程图、Worker）
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoordinatorError::WorkerNotFound { .. }
                | CoordinatorError::FlowchartNotFound { .. }
                | CoordinatorError::FileNotFound { .. }
                | CoordinatorError::VersionNotFound { .. }
        )
    }
}

/// 统一的Result类型
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;
