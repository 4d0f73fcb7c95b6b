use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 连接探测接口
///
/// 连接恢复循环在每次退避等待后调用 `probe`，返回 `true` 表示组件已可达。
#[async_trait]
pub trait ConnectionProber: Send + Sync {
    /// `failed_at` 为本次故障的发生时间
    async fn probe(&self, component_id: &str, failed_at: DateTime<Utc>) -> bool;
}
