use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 协作消息类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskDelegation,
    VerificationRequest,
    CollaborationInvite,
    StatusUpdate,
    ResultReport,
    ErrorNotification,
    Heartbeat,
    Broadcast,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::TaskDelegation => "task_delegation",
            MessageType::VerificationRequest => "verification_request",
            MessageType::CollaborationInvite => "collaboration_invite",
            MessageType::StatusUpdate => "status_update",
            MessageType::ResultReport => "result_report",
            MessageType::ErrorNotification => "error_notification",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Broadcast => "broadcast",
        }
    }
}

/// 消息优先级，数值越大越先投递
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessagePriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Urgent = 4,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagePriority::Low => "low",
            MessagePriority::Normal => "normal",
            MessagePriority::High => "high",
            MessagePriority::Urgent => "urgent",
        }
    }
}

impl Default for MessagePriority {
    fn default() -> Self {
        MessagePriority::Normal
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Expired,
}

fn default_response_timeout() -> u64 {
    30
}

/// 调用方提交的待路由消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutgoingMessage {
    pub message_type: MessageType,
    pub content: serde_json::Value,
    #[serde(default)]
    pub priority: MessagePriority,
    #[serde(default)]
    pub requires_response: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// 相对过期时间，未指定 `expires_at` 时生效
    #[serde(default)]
    pub expires_in_seconds: Option<i64>,
    #[serde(default)]
    pub collaborative_space_id: Option<String>,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_seconds: u64,
}

impl OutgoingMessage {
    pub fn new(message_type: MessageType, content: serde_json::Value) -> Self {
        Self {
            message_type,
            content,
            priority: MessagePriority::Normal,
            requires_response: false,
            expires_at: None,
            expires_in_seconds: None,
            collaborative_space_id: None,
            response_timeout_seconds: default_response_timeout(),
        }
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn requiring_response(mut self) -> Self {
        self.requires_response = true;
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.expires_in_seconds = Some(seconds);
        self
    }

    pub fn in_space(mut self, space_id: impl Into<String>) -> Self {
        self.collaborative_space_id = Some(space_id.into());
        self
    }

    /// 计算绝对过期时间
    pub fn resolve_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_at
            .or_else(|| self.expires_in_seconds.map(|secs| now + Duration::seconds(secs)))
    }
}

/// 路由中的协作消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeMessage {
    pub message_id: String,
    pub from_worker_id: String,
    pub to_worker_id: String,
    pub message_type: MessageType,
    pub content: serde_json::Value,
    pub priority: MessagePriority,
    pub requires_response: bool,
    pub response_timeout_seconds: u64,
    pub collaborative_space_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub delivery_status: DeliveryStatus,
    pub delivery_attempts: u32,
    pub max_delivery_attempts: u32,
}

impl CollaborativeMessage {
    pub fn new(
        from_worker_id: &str,
        to_worker_id: &str,
        message: OutgoingMessage,
        max_delivery_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        let expires_at = message.resolve_expiry(now);
        Self {
            message_id: Uuid::new_v4().to_string(),
            from_worker_id: from_worker_id.to_string(),
            to_worker_id: to_worker_id.to_string(),
            message_type: message.message_type,
            content: message.content,
            priority: message.priority,
            requires_response: message.requires_response,
            response_timeout_seconds: message.response_timeout_seconds,
            collaborative_space_id: message.collaborative_space_id,
            created_at: now,
            expires_at,
            delivery_status: DeliveryStatus::Pending,
            delivery_attempts: 0,
            max_delivery_attempts,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.delivery_attempts >= self.max_delivery_attempts
    }

    /// 还原为可重新发送的消息（通信失败重试时使用）
    pub fn to_outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            message_type: self.message_type,
            content: self.content.clone(),
            priority: self.priority,
            requires_response: self.requires_response,
            expires_at: self.expires_at,
            expires_in_seconds: None,
            collaborative_space_id: self.collaborative_space_id.clone(),
            response_timeout_seconds: self.response_timeout_seconds,
        }
    }
}

/// 投递回执，只追加不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeliveryRecord {
    pub message_id: String,
    pub delivered_at: DateTime<Utc>,
    pub delivery_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
}
