use async_trait::async_trait;

use crate::{models::OutgoingMessage, CoordinatorResult};

/// 消息发送接口，由消息路由器实现
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// 路由一条消息，返回是否已立即投递
    ///
    /// 返回 `Ok` 即表示消息已被接收，`Ok(false)` 的消息由实现方负责后续投递。
    async fn send_message(
        &self,
        from_worker_id: &str,
        to_worker_id: &str,
        message: OutgoingMessage,
    ) -> CoordinatorResult<bool>;
}
