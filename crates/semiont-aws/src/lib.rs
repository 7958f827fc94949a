//! AWS platform for Semiont
//!
//! Maps services onto the infrastructure created by the environment's CDK
//! stacks:
//!
//! - backend, frontend, mcp, agent and generic services run as ECS services
//! - `database` is an RDS instance
//! - `filesystem` is an EFS file system (discovered, never started or stopped)
//!
//! Physical resource ids come from CloudFormation and are cached in the
//! service state file for an hour (see [`discovery`]).
//!
//! # Requirements
//!
//! - `aws.region` in the environment file, plus `aws.stacks` for provisioning
//! - credentials usable by the SDK and the `aws` CLI (`aws sso login`)
//! - `cdk` for `provision`, `docker` for `publish`

pub mod cli;
pub mod clients;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod platform;

pub use clients::{AwsClients, ClientCache};
pub use credentials::{CredentialCheckResult, check_credentials};
pub use discovery::{CloudFormationSource, DiscoveredResources, Discovery, StackSource};
pub use error::{AwsError, DiscoveryError, Result};
pub use platform::{AwsPlatform, AwsTarget};
