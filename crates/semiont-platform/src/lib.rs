//! Semiont platforms
//!
//! A platform turns a service's requirements plus a verb into concrete
//! actions on a deployment target.
//!
//! ```text
//!          ServiceContext + Verb
//!                  │
//!         ┌────────▼─────────┐
//!         │     dispatch     │── HandlerRegistry hit? ──▶ CommandHandler
//!         └────────┬─────────┘
//!                  │ otherwise
//!    ┌─────────────▼──────────────────────────────┐
//!    │          trait PlatformStrategy            │
//!    └──┬───────────┬──────────────┬───────────┬──┘
//!       │           │              │           │
//!   process       mock         container      aws
//!   (here)       (here)   (semiont-container) (semiont-aws)
//! ```
//!
//! Every verb yields a [`CommandResult`]; the CLI collects them into a
//! [`CommandResults`] envelope. Per-service state and the cloud discovery
//! cache live in [`StateManager`].

pub mod archive;
pub mod error;
pub mod handlers;
pub mod mock;
pub mod port;
pub mod process;
pub mod result;
pub mod secrets;
pub mod state;
pub mod strategy;

// Re-exports
pub use error::{PlatformError, Result};
pub use handlers::{CommandHandler, HandlerRegistry, dispatch};
pub use mock::MockPlatform;
pub use process::ProcessPlatform;
pub use result::{
    CheckDetails, CommandResult, CommandResults, ExecutionContext, LogSummary, PlatformResources,
    ServiceStatus, Summary, VerbDetails,
};
pub use secrets::{LocalSecretStore, SecretAction, SecretOutcome};
pub use state::{DISCOVERY_TTL_MS, ServiceState, StateManager, is_discovery_fresh};
pub use strategy::{PlatformStrategy, VerbOptions};
