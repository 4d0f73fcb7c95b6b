//! # Coordinator Testing Utils
//!
//! Shared testing utilities for the coordination kernel workspace.
//!
//! ## Features
//!
//! - **Mock Seams**: in-memory `WorkerDirectory`, `MessageSender` and `ConnectionProber`
//! - **Test Data Builders**: registrations, worker descriptors and outgoing messages
//! - **Helpers**: fast-ticking configs and polling utilities
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! coordinator-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
