//! Test data builders for creating test entities
//!
//! Builders come with sensible defaults so a test only spells out what it checks.

use chrono::{Duration, Utc};
use coordinator_core::models::{
    CapabilitySpec, LoadBalancingStats, MessagePriority, MessageType, OutgoingMessage,
    WorkerCapability, WorkerDescriptor, WorkerPerformance, WorkerRegistration, WorkerType,
};

/// Builder for worker registration requests
pub struct WorkerRegistrationBuilder {
    registration: WorkerRegistration,
}

impl WorkerRegistrationBuilder {
    pub fn new(worker_type: &str) -> Self {
        Self {
            registration: WorkerRegistration::new(worker_type),
        }
    }

    pub fn planner() -> Self {
        Self::new("planner")
    }

    pub fn executor() -> Self {
        Self::new("executor")
    }

    pub fn verifier() -> Self {
        Self::new("verifier")
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.registration.name = Some(name.to_string());
        self
    }

    pub fn with_capability(mut self, name: &str, level: u32) -> Self {
        self.registration = self.registration.with_capability(name, level);
        self
    }

    /// Plain capability name without a declared level
    pub fn with_simple_capability(mut self, name: &str) -> Self {
        self.registration.capabilities.push(name.to_string());
        self
    }

    pub fn with_described_capability(mut self, name: &str, level: u32, description: &str) -> Self {
        self.registration
            .enhanced_capabilities
            .push(CapabilitySpec::new(name, level).with_description(description));
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: u32) -> Self {
        self.registration.max_concurrent_tasks = Some(max);
        self
    }

    pub fn build(self) -> WorkerRegistration {
        self.registration
    }
}

/// Builder for worker descriptors handed out by mock directories
pub struct WorkerDescriptorBuilder {
    descriptor: WorkerDescriptor,
}

impl WorkerDescriptorBuilder {
    pub fn new(worker_id: &str, worker_type: WorkerType) -> Self {
        let now = Utc::now();
        Self {
            descriptor: WorkerDescriptor {
                worker_id: worker_id.to_string(),
                name: worker_id.to_string(),
                role: worker_type.to_string(),
                job_description: String::new(),
                worker_type,
                capabilities: vec![],
                enhanced_capabilities: vec![],
                performance: WorkerPerformance::new(5.0, now),
                load_stats: LoadBalancingStats::new(3, worker_type.base_priority()),
                registered_at: now,
                registration_seq: 0,
            },
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.descriptor.registration_seq = seq;
        self
    }

    pub fn with_priority_score(mut self, score: f64) -> Self {
        self.descriptor.load_stats.priority_score = score;
        self
    }

    pub fn with_load(mut self, current: u32, max: u32) -> Self {
        self.descriptor.load_stats.current_load = current;
        self.descriptor.load_stats.max_concurrent_tasks = max;
        self
    }

    pub fn with_capability(mut self, name: &str, level: u32) -> Self {
        self.descriptor.capabilities.push(name.to_string());
        self.descriptor.enhanced_capabilities.push(WorkerCapability {
            name: name.to_string(),
            level,
            description: String::new(),
            last_used: None,
        });
        self
    }

    pub fn build(self) -> WorkerDescriptor {
        self.descriptor
    }
}

/// Builder for outgoing messages
pub struct MessageBuilder {
    message: OutgoingMessage,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            message: OutgoingMessage::new(
                MessageType::StatusUpdate,
                serde_json::json!({"status": "ok"}),
            ),
        }
    }

    pub fn with_type(mut self, message_type: MessageType) -> Self {
        self.message.message_type = message_type;
        self
    }

    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.message.content = content;
        self
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.message.priority = priority;
        self
    }

    pub fn requiring_response(mut self) -> Self {
        self.message.requires_response = true;
        self
    }

    /// Expiry already in the past
    pub fn expired(mut self) -> Self {
        self.message.expires_at = Some(Utc::now() - Duration::seconds(1));
        self
    }

    pub fn expires_in_ms(mut self, millis: i64) -> Self {
        self.message.expires_at = Some(Utc::now() + Duration::milliseconds(millis));
        self
    }

    pub fn build(self) -> OutgoingMessage {
        self.message
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
