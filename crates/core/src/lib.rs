//! 协调内核核心库：错误类型、共享数据模型、组件间接口、配置、日志与关闭信号。

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod shutdown;
pub mod traits;

pub use config::*;
pub use errors::*;
pub use logging::init_logging;
pub use shutdown::{join_with_timeout, ShutdownManager};
pub use traits::*;
