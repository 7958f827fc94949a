//! Configuration and platform model
//!
//! Plain data shared by every crate in the workspace.

mod environment;
mod platform;
mod service;

// Re-exports
pub use environment::*;
pub use platform::*;
pub use service::*;
