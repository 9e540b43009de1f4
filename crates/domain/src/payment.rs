//! Payment-status interpretation.

use crate::constants::PAID_STATUS_SYNONYMS;

/// Returns `true` when `status` spells a paid state.
///
/// Matching is intentionally literal against [`PAID_STATUS_SYNONYMS`]: the
/// gateways emit several spellings and the historical set is preserved
/// rather than inferring a canonical form.
pub fn is_paid_status(status: Option<&str>) -> bool {
    matches!(status, Some(s) if PAID_STATUS_SYNONYMS.contains(&s))
}
