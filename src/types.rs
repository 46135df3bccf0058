// =============================================================================
// Shared types used across the BTScan telemetry engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Which dashboard view the refresh loop is currently driving.
///
/// Serialised in lowercase so API payloads read `"aggregate"`, `"series"`,
/// `"waterfall"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Aggregate,
    Series,
    Waterfall,
}

impl Default for ViewKind {
    fn default() -> Self {
        Self::Aggregate
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggregate => write!(f, "aggregate"),
            Self::Series => write!(f, "series"),
            Self::Waterfall => write!(f, "waterfall"),
        }
    }
}
