//! Plan tiers and quota resource kinds.

use serde::{Deserialize, Serialize};

/// Subscription tier a quota-limited actor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Business,
}

/// Resource dimensions tracked against monthly plan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ApiCalls,
    StorageMb,
    BandwidthMb,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::ApiCalls => "api_calls",
            ResourceKind::StorageMb => "storage_mb",
            ResourceKind::BandwidthMb => "bandwidth_mb",
        }
    }
}
