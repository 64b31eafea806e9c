//! Document schema versioning.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::defaults;

/// Schema version written into new documents.
pub const CURRENT_SCHEMA_VERSION: &str = defaults::SCHEMA_VERSION;

/// Semantic version for document format compatibility checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    /// The version this build writes.
    pub fn current() -> Self {
        Version {
            major: 1,
            minor: 0,
            patch: 0,
        }
    }

    /// Parse a version string (e.g., "1.0.0").
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(format!("Invalid version format: {}", s));
        }

        let component = |idx: usize, name: &str| {
            parts[idx]
                .parse::<u64>()
                .map_err(|_| format!("Invalid {} version: {}", name, parts[idx]))
        };

        Ok(Version {
            major: component(0, "major")?,
            minor: component(1, "minor")?,
            patch: component(2, "patch")?,
        })
    }

    /// A document written as `self` can be read by a build at `reader`.
    ///
    /// Only the major version matters: minor and patch bumps add optional
    /// fields, which older readers ignore and newer readers default.
    pub fn is_readable_by(&self, reader: &Version) -> bool {
        self.major == reader.major
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Serde default for `schema_version` fields.
pub fn default_schema_version() -> String {
    CURRENT_SCHEMA_VERSION.to_string()
}
