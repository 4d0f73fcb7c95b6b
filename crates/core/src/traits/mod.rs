pub mod directory;
pub mod messaging;
pub mod probe;

pub use directory::*;
pub use messaging::*;
pub use probe::*;
