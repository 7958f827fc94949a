//! Platform types and lifecycle verbs

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment target a service is realised on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Process,
    Container,
    Aws,
    Mock,
}

impl PlatformType {
    pub const ALL: [PlatformType; 4] = [
        PlatformType::Process,
        PlatformType::Container,
        PlatformType::Aws,
        PlatformType::Mock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Process => "process",
            PlatformType::Container => "container",
            PlatformType::Aws => "aws",
            PlatformType::Mock => "mock",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "process" | "posix" => Ok(PlatformType::Process),
            "container" | "docker" | "podman" => Ok(PlatformType::Container),
            "aws" => Ok(PlatformType::Aws),
            "mock" => Ok(PlatformType::Mock),
            other => Err(CoreError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Lifecycle operation a platform performs for a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Start,
    Stop,
    Check,
    Update,
    Provision,
    Publish,
    Backup,
    Restore,
    Test,
    Exec,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Check => "check",
            Verb::Update => "update",
            Verb::Provision => "provision",
            Verb::Publish => "publish",
            Verb::Backup => "backup",
            Verb::Restore => "restore",
            Verb::Test => "test",
            Verb::Exec => "exec",
        }
    }

    /// Whether the verb may change platform state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Verb::Check)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Verb::Start),
            "stop" => Ok(Verb::Stop),
            "check" => Ok(Verb::Check),
            "update" => Ok(Verb::Update),
            "provision" => Ok(Verb::Provision),
            "publish" => Ok(Verb::Publish),
            "backup" => Ok(Verb::Backup),
            "restore" => Ok(Verb::Restore),
            "test" => Ok(Verb::Test),
            "exec" => Ok(Verb::Exec),
            other => Err(CoreError::UnknownVerb(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_aliases() {
        assert_eq!("docker".parse::<PlatformType>().unwrap(), PlatformType::Container);
        assert_eq!("AWS".parse::<PlatformType>().unwrap(), PlatformType::Aws);
        assert!("kubernetes".parse::<PlatformType>().is_err());
    }

    #[test]
    fn test_platform_serde_lowercase() {
        let json = serde_json::to_string(&PlatformType::Container).unwrap();
        assert_eq!(json, "\"container\"");
    }

    #[test]
    fn test_check_is_the_only_read_only_verb() {
        assert!(!Verb::Check.is_mutating());
        assert!(Verb::Stop.is_mutating());
    }
}
