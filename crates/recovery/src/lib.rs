pub mod prober;
pub mod recovery;
pub mod strategy;

pub use prober::RegistryProber;
pub use recovery::{
    ErrorRecoverySystem, PendingReassignment, RecoveryStatistics, ResourceLock, SystemHealth,
};
pub use strategy::determine_strategy;
