//! 协作式Worker协调内核
//!
//! 由四个组件组成：Worker注册表、消息路由器、故障恢复系统和共享文件系统，
//! [`CollaborativeServer`] 负责组装和启停。

pub mod app;

pub use app::{CollaborativeServer, ServerStatus};
