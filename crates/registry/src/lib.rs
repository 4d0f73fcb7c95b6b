pub mod flowchart;
pub mod registry;
pub mod strategies;

pub use registry::{RegistryStatistics, WorkerRegistry, WorkerSummary};
pub use strategies::{create_strategy, CapabilityWeightedStrategy, LeastLoadedStrategy, SelectionStrategy};
