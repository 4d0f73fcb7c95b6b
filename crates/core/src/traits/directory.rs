use async_trait::async_trait;

use crate::models::{TaskRequirements, WorkerDescriptor, WorkerType};

/// Worker目录接口
///
/// 由Worker注册表实现，消息路由器和故障恢复系统通过它查询Worker身份、
/// 按类型解析广播目标、重新分配任务以及裁决资源冲突。
#[async_trait]
pub trait WorkerDirectory: Send + Sync {
    /// Worker是否已注册
    async fn is_registered(&self, worker_id: &str) -> bool;

    /// 所有已注册Worker的ID（按注册顺序），可排除一个
    async fn active_worker_ids(&self, exclude: Option<&str>) -> Vec<String>;

    /// 指定类型的Worker ID（按注册顺序）
    async fn worker_ids_by_type(&self, worker_type: WorkerType, available_only: bool) -> Vec<String>;

    /// 查询Worker声明的类型
    async fn worker_type(&self, worker_id: &str) -> Option<WorkerType>;

    /// 负载均衡选择Worker，选中即占用一个并发槽位
    async fn select_worker(
        &self,
        worker_type: WorkerType,
        requirements: &TaskRequirements,
    ) -> Option<WorkerDescriptor>;

    /// 资源冲突裁决依据：(优先级评分, 注册顺序)
    async fn priority_rank(&self, worker_id: &str) -> Option<(f64, u64)>;
}
