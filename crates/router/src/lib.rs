pub mod queue;
pub mod router;

pub use queue::PriorityQueue;
pub use router::{MessageCallback, MessageRouter, RoutingStatistics};
