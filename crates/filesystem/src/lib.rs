//! 协作空间共享文件系统
//!
//! 每个协作空间一个 [`SharedFileSystem`]，提供版本化存储、建议性文件锁和按Worker的访问控制；
//! [`FileSpaces`] 按空间ID管理这些文件系统。

pub mod filesystem;
pub mod models;
pub mod spaces;

pub use filesystem::{FileInfo, FileSystemStats, SharedFileSystem};
pub use models::{FileHandle, FileLock, FilePermission, FileVersion, LockType};
pub use spaces::FileSpaces;
