//! Bus configuration

use serde::{Deserialize, Serialize};
use std::env;

/// What `post` does when a handler returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop delivery at the first failing handler and return its error.
    #[default]
    Abort,
    /// Run every handler, then return all collected failures.
    Isolate,
}

impl FailurePolicy {
    /// Parse a policy name (`abort` or `isolate`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Some(FailurePolicy::Abort),
            "isolate" => Some(FailurePolicy::Isolate),
            _ => None,
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Name reported in log records
    pub name: String,

    /// Enable subscription and failure logging
    pub enable_logging: bool,

    /// Handler failure policy
    pub failure_policy: FailurePolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            enable_logging: true,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl BusConfig {
    /// Create config from environment variables.
    ///
    /// - `FLAREBUS_BUS_NAME` - bus name
    /// - `FLAREBUS_LOG=1|0` - enable/disable logging
    /// - `FLAREBUS_FAILURE_POLICY=abort|isolate` - handler failure policy
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let name = lookup("FLAREBUS_BUS_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.name);

        let enable_logging = lookup("FLAREBUS_LOG")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(defaults.enable_logging);

        let failure_policy = lookup("FLAREBUS_FAILURE_POLICY")
            .and_then(|v| FailurePolicy::parse(&v))
            .unwrap_or(defaults.failure_policy);

        Self {
            name,
            enable_logging,
            failure_policy,
        }
    }
}
