//! 配置管理
//!
//! 配置加载顺序：内置默认值 → TOML配置文件 → 环境变量（前缀 `COORDINATOR`，层级分隔符 `__`）。
//! 例如 `COORDINATOR_ROUTER__QUEUE_SIZE=500` 覆盖 `[router] queue_size`。

pub mod app_config;
pub mod components;
pub mod server_observability;

pub use app_config::AppConfig;
pub use components::{FileSystemConfig, RecoveryConfig, RegistryConfig, RouterConfig};
pub use server_observability::{ObservabilityConfig, ServerConfig};
