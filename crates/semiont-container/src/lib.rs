//! Semiont container platform
//!
//! Drives `docker` (or `podman` when docker is absent) through its CLI.
//! Text output is scraped by the parsers in [`parse`]; a parse failure
//! degrades a `check` to `status: unknown` rather than failing it.

pub mod error;
pub mod health;
pub mod parse;
pub mod platform;
pub mod runtime;

pub use error::*;
pub use health::register_health_checks;
pub use platform::{ContainerPlatform, container_name};
pub use runtime::{ContainerRuntime, RunSpec};
