//! Strongly-typed identifiers for pipelines, builds and evaluations.

use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }
    };
}

// One trigger evaluation pass, used to correlate its log lines.
define_id!(EvaluationId, "evl");

/// Fully-qualified name of a pipeline (e.g. `team/libs/core`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PipelineRef(String);

impl PipelineRef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self(full_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PipelineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PipelineRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One execution of a pipeline. Build numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "RawBuildRef")]
pub struct BuildRef {
    pipeline: PipelineRef,
    number: u32,
}

#[derive(Deserialize)]
struct RawBuildRef {
    pipeline: PipelineRef,
    number: u32,
}

impl TryFrom<RawBuildRef> for BuildRef {
    type Error = Error;

    fn try_from(raw: RawBuildRef) -> Result<Self> {
        Self::new(raw.pipeline, raw.number)
    }
}

impl BuildRef {
    pub fn new(pipeline: impl Into<PipelineRef>, number: u32) -> Result<Self> {
        let pipeline = pipeline.into();
        if number == 0 {
            return Err(Error::InvalidBuildNumber {
                pipeline: pipeline.to_string(),
                number,
            });
        }
        Ok(Self { pipeline, number })
    }

    pub fn pipeline(&self) -> &PipelineRef {
        &self.pipeline
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pipeline, self.number)
    }
}

/// Authorization context a build runs as.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    const SYSTEM: &'static str = "SYSTEM";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The unrestricted context builds run as when no other is configured.
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_id_display() {
        let id = EvaluationId::new();
        assert!(id.to_string().starts_with("evl_"));
    }

    #[test]
    fn test_evaluation_id_parse() {
        let id = EvaluationId::new();
        let parsed: EvaluationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_build_ref_display() {
        let build = BuildRef::new("team/libs/core", 12).unwrap();
        assert_eq!(build.to_string(), "team/libs/core#12");
    }

    #[test]
    fn test_build_number_zero_rejected() {
        let err = BuildRef::new("core", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidBuildNumber { number: 0, .. }));
    }

    #[test]
    fn test_deserialize_rejects_build_number_zero() {
        let err = serde_json::from_str::<BuildRef>(r#"{"pipeline":"core","number":0}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid build number 0"));

        let build: BuildRef = serde_json::from_str(r#"{"pipeline":"core","number":3}"#).unwrap();
        assert_eq!(build, BuildRef::new("core", 3).unwrap());
    }

    #[test]
    fn test_system_principal() {
        assert!(Principal::system().is_system());
        assert!(!Principal::new("alice").is_system());
    }
}
