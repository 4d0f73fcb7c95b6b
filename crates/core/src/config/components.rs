use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 支持的Worker选择策略
pub const SELECTION_STRATEGIES: [&str; 2] = ["capability_weighted", "least_loaded"];

/// Worker注册表配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub default_max_concurrent_tasks: u32,
    pub selection_strategy: String, // "capability_weighted", "least_loaded"
    pub inactive_threshold_minutes: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent_tasks: 3,
            selection_strategy: "capability_weighted".to_string(),
            inactive_threshold_minutes: 30,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_max_concurrent_tasks == 0 {
            return Err(anyhow::anyhow!("默认最大并发任务数必须大于0"));
        }

        if !SELECTION_STRATEGIES.contains(&self.selection_strategy.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的选择策略: {}，支持的策略: {:?}",
                self.selection_strategy,
                SELECTION_STRATEGIES
            ));
        }

        if self.inactive_threshold_minutes <= 0 {
            return Err(anyhow::anyhow!("不活跃阈值必须大于0"));
        }

        Ok(())
    }
}

/// 消息路由器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// 每个接收者的队列容量
    pub queue_size: usize,
    pub max_delivery_attempts: u32,
    /// 消息历史上限，超出后保留最新的80%
    pub history_limit: usize,
    pub delivery_record_limit: usize,
    pub process_interval_ms: u64,
    /// 路由后是否立即尝试投递
    pub immediate_delivery: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            max_delivery_attempts: 3,
            history_limit: 1000,
            delivery_record_limit: 1000,
            process_interval_ms: 100,
            immediate_delivery: true,
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_size == 0 {
            return Err(anyhow::anyhow!("消息队列容量必须大于0"));
        }

        if self.max_delivery_attempts == 0 {
            return Err(anyhow::anyhow!("最大投递次数必须大于0"));
        }

        if self.history_limit < 10 {
            return Err(anyhow::anyhow!("消息历史上限不能小于10"));
        }

        if self.delivery_record_limit < 10 {
            return Err(anyhow::anyhow!("投递记录上限不能小于10"));
        }

        if self.process_interval_ms == 0 {
            return Err(anyhow::anyhow!("消息处理间隔必须大于0"));
        }

        Ok(())
    }

    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }

    /// 超出上限后裁剪到的长度
    pub fn history_trim_len(&self) -> usize {
        self.history_limit * 4 / 5
    }

    pub fn delivery_record_trim_len(&self) -> usize {
        self.delivery_record_limit * 4 / 5
    }
}

/// 时间窗口类配置的上限：一年
const MAX_WINDOW_SECONDS: i64 = 365 * 24 * 3600;

/// 故障恢复配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub max_retry_attempts: u32,
    pub retry_delay_base_ms: u64,
    pub heartbeat_interval_seconds: u64,
    pub recovery_tick_ms: u64,
    /// 资源锁超时，默认10分钟
    pub lock_timeout_seconds: i64,
    /// 策略判定统计窗口
    pub strategy_window_minutes: i64,
    /// 心跳循环合成故障的去重窗口
    pub heartbeat_failure_dedup_minutes: i64,
    /// 排队等待重新分配的任务超过该时长后放弃
    pub reassignment_timeout_minutes: i64,
    pub shutdown_timeout_seconds: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            retry_delay_base_ms: 1000,
            heartbeat_interval_seconds: 30, // 30秒心跳间隔
            recovery_tick_ms: 1000,
            lock_timeout_seconds: 600,
            strategy_window_minutes: 10,
            heartbeat_failure_dedup_minutes: 5,
            reassignment_timeout_minutes: 30,
            shutdown_timeout_seconds: 5,
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_retry_attempts == 0 {
            return Err(anyhow::anyhow!("最大重试次数必须大于0"));
        }

        if self.retry_delay_base_ms == 0 {
            return Err(anyhow::anyhow!("重试基础延迟必须大于0"));
        }

        if self.heartbeat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.recovery_tick_ms == 0 {
            return Err(anyhow::anyhow!("恢复循环间隔必须大于0"));
        }

        if self.heartbeat_interval_seconds > MAX_WINDOW_SECONDS as u64 {
            return Err(anyhow::anyhow!("心跳间隔不能超过一年"));
        }

        if self.lock_timeout_seconds <= 0 || self.lock_timeout_seconds > MAX_WINDOW_SECONDS {
            return Err(anyhow::anyhow!("资源锁超时时间必须在1秒到一年之间"));
        }

        for (name, minutes) in [
            ("策略统计窗口", self.strategy_window_minutes),
            ("心跳故障去重窗口", self.heartbeat_failure_dedup_minutes),
            ("任务重新分配时限", self.reassignment_timeout_minutes),
        ] {
            if minutes <= 0 || minutes > MAX_WINDOW_SECONDS / 60 {
                return Err(anyhow::anyhow!("{}必须在1分钟到一年之间", name));
            }
        }

        Ok(())
    }

    pub fn retry_delay_base(&self) -> Duration {
        Duration::from_millis(self.retry_delay_base_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn recovery_tick(&self) -> Duration {
        Duration::from_millis(self.recovery_tick_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// 第 `attempt` 次重试前的退避延迟（从1开始）
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay_base() * 2u32.pow(exponent)
    }
}

/// 共享文件系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemConfig {
    /// 未指定超时时的默认锁超时，0表示永不过期
    pub default_lock_timeout_seconds: u64,
}

impl Default for FileSystemConfig {
    fn default() -> Self {
        Self {
            default_lock_timeout_seconds: 300,
        }
    }
}

impl FileSystemConfig {
    /// 默认锁超时上限：一年
    pub const MAX_LOCK_TIMEOUT_SECONDS: u64 = MAX_WINDOW_SECONDS as u64;

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_lock_timeout_seconds > Self::MAX_LOCK_TIMEOUT_SECONDS {
            return Err(anyhow::anyhow!(
                "默认锁超时不能超过 {} 秒",
                Self::MAX_LOCK_TIMEOUT_SECONDS
            ));
        }
        Ok(())
    }
}
