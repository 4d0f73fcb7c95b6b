use std::collections::VecDeque;

use coordinator_core::models::MessagePriority;

const PRIORITIES: [MessagePriority; 4] = [
    MessagePriority::Urgent,
    MessagePriority::High,
    MessagePriority::Normal,
    MessagePriority::Low,
];

fn lane(priority: MessagePriority) -> usize {
    match priority {
        MessagePriority::Urgent => 0,
        MessagePriority::High => 1,
        MessagePriority::Normal => 2,
        MessagePriority::Low => 3,
    }
}

/// 单个接收者的有界优先级队列
///
/// 高优先级先出，同一优先级内先进先出。队列只保存消息ID。
#[derive(Debug)]
pub struct PriorityQueue {
    lanes: [VecDeque<String>; 4],
    capacity: usize,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: Default::default(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// 入队，队列已满时返回 false
    pub fn push(&mut self, message_id: String, priority: MessagePriority) -> bool {
        if self.is_full() {
            return false;
        }
        self.lanes[lane(priority)].push_back(message_id);
        true
    }

    /// 放回队首，用于投递失败后保持原有顺序
    pub fn push_front(&mut self, message_id: String, priority: MessagePriority) {
        self.lanes[lane(priority)].push_front(message_id);
    }

    pub fn pop(&mut self) -> Option<(String, MessagePriority)> {
        for priority in PRIORITIES {
            if let Some(id) = self.lanes[lane(priority)].pop_front() {
                return Some((id, priority));
            }
        }
        None
    }

    pub fn remove(&mut self, message_id: &str) -> bool {
        for queue in self.lanes.iter_mut() {
            if let Some(pos) = queue.iter().position(|id| id == message_id) {
                queue.remove(pos);
                return true;
            }
        }
        false
    }

    /// 按出队顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.lanes.iter().flat_map(|queue| queue.iter())
    }

    pub fn clear(&mut self) {
        self.lanes.iter_mut().for_each(VecDeque::clear);
    }
}
