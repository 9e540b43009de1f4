//! Plan-based quota checks - core business logic
//!
//! Compares an actor's externally tracked usage against the monthly limit
//! of their plan tier. Lookup failures fail open: an internal error never
//! blocks a legitimate request.

use std::sync::Arc;

use slotbook_domain::constants::QUOTA_UNLIMITED;
use slotbook_domain::{PlanTier, ResourceKind, Result, SlotbookError};
use tracing::{debug, warn};

use super::ports::{PlanDirectory, UsageSource};

/// Monthly limits per tier and resource; [`QUOTA_UNLIMITED`] disables the cap.
#[derive(Debug, Clone)]
pub struct QuotaLimits {
    pub free_api_calls: i64,
    pub free_storage_mb: i64,
    pub free_bandwidth_mb: i64,
    pub pro_api_calls: i64,
    pub pro_storage_mb: i64,
    pub pro_bandwidth_mb: i64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            free_api_calls: 1_000,
            free_storage_mb: 512,
            free_bandwidth_mb: 1_024,
            pro_api_calls: 100_000,
            pro_storage_mb: 10_240,
            pro_bandwidth_mb: QUOTA_UNLIMITED,
        }
    }
}

impl QuotaLimits {
    /// Limit for one tier/resource pair. Business is uncapped everywhere.
    pub fn limit_for(&self, tier: PlanTier, resource: ResourceKind) -> i64 {
        match (tier, resource) {
            (PlanTier::Free, ResourceKind::ApiCalls) => self.free_api_calls,
            (PlanTier::Free, ResourceKind::StorageMb) => self.free_storage_mb,
            (PlanTier::Free, ResourceKind::BandwidthMb) => self.free_bandwidth_mb,
            (PlanTier::Pro, ResourceKind::ApiCalls) => self.pro_api_calls,
            (PlanTier::Pro, ResourceKind::StorageMb) => self.pro_storage_mb,
            (PlanTier::Pro, ResourceKind::BandwidthMb) => self.pro_bandwidth_mb,
            (PlanTier::Business, _) => QUOTA_UNLIMITED,
        }
    }
}

/// Plan-based quota limiter
pub struct QuotaService {
    plans: Arc<dyn PlanDirectory>,
    usage: Arc<dyn UsageSource>,
    limits: QuotaLimits,
}

impl QuotaService {
    /// Create a new quota service with the default limits table
    pub fn new(plans: Arc<dyn PlanDirectory>, usage: Arc<dyn UsageSource>) -> Self {
        Self::with_limits(plans, usage, QuotaLimits::default())
    }

    /// Create a quota service with a custom limits table
    pub fn with_limits(
        plans: Arc<dyn PlanDirectory>,
        usage: Arc<dyn UsageSource>,
        limits: QuotaLimits,
    ) -> Self {
        Self { plans, usage, limits }
    }

    /// Reject with `ResourceExhausted` when `actor_id` is over the monthly
    /// limit for `resource`; otherwise allow.
    pub async fn check_quota(&self, actor_id: &str, resource: ResourceKind) -> Result<()> {
        let tier = match self.plans.plan_for(actor_id).await {
            Ok(tier) => tier,
            Err(err) => {
                warn!(actor_id, error = %err, "plan lookup failed; allowing request");
                return Ok(());
            }
        };

        let limit = self.limits.limit_for(tier, resource);
        if limit == QUOTA_UNLIMITED {
            return Ok(());
        }

        let used = match self.usage.usage_for(actor_id, resource).await {
            Ok(used) => used,
            Err(err) => {
                warn!(actor_id, error = %err, "usage lookup failed; allowing request");
                return Ok(());
            }
        };

        if used >= limit as u64 {
            return Err(SlotbookError::ResourceExhausted(format!(
                "{} quota exhausted for {actor_id} ({used}/{limit})",
                resource.label()
            )));
        }

        debug!(actor_id, resource = resource.label(), used, limit, "quota check passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct FixedPlan(Result<PlanTier>);

    #[async_trait]
    impl PlanDirectory for FixedPlan {
        async fn plan_for(&self, _actor_id: &str) -> Result<PlanTier> {
            match &self.0 {
                Ok(tier) => Ok(*tier),
                Err(_) => Err(SlotbookError::Internal("plan store down".into())),
            }
        }
    }

    struct FixedUsage(Result<u64>);

    #[async_trait]
    impl UsageSource for FixedUsage {
        async fn usage_for(&self, _actor_id: &str, _resource: ResourceKind) -> Result<u64> {
            match &self.0 {
                Ok(used) => Ok(*used),
                Err(_) => Err(SlotbookError::Internal("usage pipeline down".into())),
            }
        }
    }

    fn service(plan: Result<PlanTier>, usage: Result<u64>) -> QuotaService {
        QuotaService::new(Arc::new(FixedPlan(plan)), Arc::new(FixedUsage(usage)))
    }

    #[tokio::test]
    async fn under_limit_is_allowed() {
        let svc = service(Ok(PlanTier::Free), Ok(999));
        assert!(svc.check_quota("actor", ResourceKind::ApiCalls).await.is_ok());
    }

    #[tokio::test]
    async fn at_limit_is_rejected() {
        let svc = service(Ok(PlanTier::Free), Ok(1_000));
        let err = svc.check_quota("actor", ResourceKind::ApiCalls).await.unwrap_err();
        assert!(matches!(err, SlotbookError::ResourceExhausted(_)));
    }

    #[tokio::test]
    async fn unlimited_tier_never_rejects() {
        let svc = service(Ok(PlanTier::Business), Ok(u64::MAX));
        assert!(svc.check_quota("actor", ResourceKind::ApiCalls).await.is_ok());
    }

    #[tokio::test]
    async fn unlimited_resource_skips_usage_lookup() {
        // Pro bandwidth is uncapped; a broken usage pipeline must not matter.
        let svc = service(Ok(PlanTier::Pro), Err(SlotbookError::Internal("down".into())));
        assert!(svc.check_quota("actor", ResourceKind::BandwidthMb).await.is_ok());
    }

    #[tokio::test]
    async fn usage_lookup_failure_fails_open() {
        let svc = service(Ok(PlanTier::Free), Err(SlotbookError::Internal("down".into())));
        assert!(svc.check_quota("actor", ResourceKind::ApiCalls).await.is_ok());
    }

    #[tokio::test]
    async fn plan_lookup_failure_fails_open() {
        let svc = service(Err(SlotbookError::Internal("down".into())), Ok(0));
        assert!(svc.check_quota("actor", ResourceKind::ApiCalls).await.is_ok());
    }
}
