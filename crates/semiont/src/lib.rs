//! Semiont CLI
//!
//! Loads a project and one of its environments, selects services, and runs
//! a verb for each of them on the platform the environment assigns.

pub mod commands;
pub mod executor;
pub mod output;
pub mod platforms;
pub mod session;

pub use executor::{CommandDescriptor, Executor};
pub use output::OutputFormat;
pub use platforms::PlatformSet;
pub use session::Session;
