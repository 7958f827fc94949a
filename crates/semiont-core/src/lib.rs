//! Semiont Core
//!
//! The declarative half of Semiont's deployment model: services describe
//! *what* they need, platforms (in `semiont-platform` and friends) decide
//! *how* to provide it.
//!
//! ```text
//!   environments/<env>.json
//!            │
//!            ▼
//!   ServiceFactory::create(name, platform, config)
//!            │
//!            ▼
//!   Box<dyn Service> ──requirements()──▶ ServiceRequirements
//!                                           │
//!                                           ▼
//!                                  PlatformStrategy::<verb>
//! ```

pub mod error;
pub mod factory;
pub mod model;
pub mod requirements;
pub mod service;

// Re-exports
pub use error::{CoreError, Result};
pub use factory::ServiceFactory;
pub use model::*;
pub use requirements::{ServiceRequirements, merge_requirements};
pub use service::{
    HealthReport, RuntimeFlags, Service, ServiceBase, ServiceContext, ServiceKind,
};
