//! # 数据模型
//!
//! 协调内核各组件共享的数据结构：Worker、流程图、协作消息、故障记录。
//!
//! ## 设计原则
//!
//! - 所有时间字段使用 `DateTime<Utc>` 确保时区一致性
//! - 状态字段使用枚举类型，避免无效状态
//! - 所有模型实现 `serde::Serialize` 和 `serde::Deserialize`
//!
//! ## 使用示例
//!
//! ```rust
//! use coordinator_core::models::*;
//!
//! let registration = WorkerRegistration::new("executor")
//!     .with_name("代码执行者")
//!     .with_capability("coding", 8)
//!     .with_max_concurrent_tasks(2);
//!
//! let message = OutgoingMessage::new(
//!     MessageType::TaskDelegation,
//!     serde_json::json!({"task": "实现登录模块"}),
//! )
//! .with_priority(MessagePriority::High);
//! # let _ = (registration, message);
//! ```

pub mod failure;
pub mod flowchart;
pub mod message;
pub mod worker;

pub use failure::*;
pub use flowchart::*;
pub use message::*;
pub use worker::*;
