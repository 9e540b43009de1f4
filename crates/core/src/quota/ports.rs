//! Port interfaces for plan-based quotas
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use slotbook_domain::{PlanTier, ResourceKind, Result};

/// Trait for resolving an actor's subscription tier
#[async_trait]
pub trait PlanDirectory: Send + Sync {
    async fn plan_for(&self, actor_id: &str) -> Result<PlanTier>;
}

/// Trait for reading an actor's current usage
///
/// Usage is tracked externally (billing pipeline); this port only reads the
/// running total for the current period.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn usage_for(&self, actor_id: &str, resource: ResourceKind) -> Result<u64>;
}
