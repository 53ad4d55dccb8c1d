// SPDX-FileCopyrightText: 2026 Memdex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the storage, retrieval, and sync layers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which source collection a file or chunk came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Markdown and text documents under the memory directories.
    Memory,
    /// Flattened conversation transcripts.
    Sessions,
}

impl SourceKind {
    /// Both collections, in the order the sync pipeline walks them.
    pub const ALL: [SourceKind; 2] = [SourceKind::Memory, SourceKind::Sessions];

    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Memory => "memory",
            SourceKind::Sessions => "sessions",
        }
    }

    /// Parse from SQLite string. Unknown values fall back to `Memory`.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "sessions" => SourceKind::Sessions,
            _ => SourceKind::Memory,
        }
    }
}

/// Health status reported by provider health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn source_kind_storage_strings() {
        assert_eq!(SourceKind::Memory.as_str(), "memory");
        assert_eq!(SourceKind::Sessions.as_str(), "sessions");
        assert_eq!(SourceKind::from_str_value("sessions"), SourceKind::Sessions);
        assert_eq!(SourceKind::from_str_value("memory"), SourceKind::Memory);
        assert_eq!(SourceKind::from_str_value("bogus"), SourceKind::Memory);
    }

    #[test]
    fn source_kind_display_matches_storage() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
            assert_eq!(SourceKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn source_kind_serde_lowercase() {
        let json = serde_json::to_string(&SourceKind::Sessions).unwrap();
        assert_eq!(json, "\"sessions\"");
        let parsed: SourceKind = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(parsed, SourceKind::Memory);
    }
}
