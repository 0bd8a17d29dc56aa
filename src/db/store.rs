use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{PlanTier, Subscriber};

/// Persistence contract for subscribers and their credit ledger.
///
/// Implementations must make [`reserve_credit`](Self::reserve_credit) atomic
/// per subscriber: under any interleaving of concurrent calls, a balance of
/// N admits exactly N reservations. Postgres gets this from a conditional
/// single-statement UPDATE, the memory store from per-entry locking.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Resolves a key digest to an active subscriber, applying the lazy
    /// billing-period reset on the way out. Unknown digests and cancelled
    /// accounts both come back as `None`.
    async fn find_by_key_digest(&self, digest: &str) -> Result<Option<Subscriber>, ApiError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>, ApiError>;

    /// Takes one credit, returning the balance after the decrement. A
    /// balance of zero fails with [`ApiError::QuotaExceeded`] and mutates
    /// nothing.
    async fn reserve_credit(&self, id: Uuid) -> Result<i64, ApiError>;

    /// Returns a reserved credit after a failed dispatch. Clamped at the
    /// tier allowance so refunds can never mint extra balance.
    async fn release_credit(&self, id: Uuid) -> Result<(), ApiError>;

    /// Counts one completed call.
    async fn record_usage(&self, id: Uuid) -> Result<(), ApiError>;

    /// Creates a brand-new subscriber with its key digest. A taken email is
    /// a [`ApiError::BadRequest`].
    async fn insert(&self, subscriber: &Subscriber, key_digest: &str) -> Result<(), ApiError>;

    /// Creates or replaces the subscriber for an email at the given tier
    /// with a fresh allowance, period, and key digest. The billing partner's
    /// "subscribed" webhook lands here.
    async fn upsert_with_key(
        &self,
        email: &str,
        name: Option<String>,
        tier: PlanTier,
        key_digest: &str,
    ) -> Result<Subscriber, ApiError>;

    /// Moves an existing subscriber to a tier, resetting the balance to the
    /// new allowance and restarting the period.
    async fn change_tier(&self, email: &str, tier: PlanTier) -> Result<Subscriber, ApiError>;

    /// Flips the active flag. Inactive keys stop resolving.
    async fn set_active(&self, email: &str, active: bool) -> Result<(), ApiError>;
}

/// Advances a billing boundary past `now` in whole 30-day steps. A
/// subscriber idle for five months resets once, to the next boundary after
/// now, not five times.
pub fn advanced_boundary(mut boundary: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    while boundary <= now {
        boundary += Duration::days(30);
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_advances_exactly_past_now() {
        let start = Utc::now() - Duration::days(95);
        let next = advanced_boundary(start, Utc::now());
        assert!(next > Utc::now());
        assert!(next <= Utc::now() + Duration::days(30));
        // 95 days late lands on the fourth 30-day step
        assert_eq!(next, start + Duration::days(120));
    }

    #[test]
    fn future_boundary_is_untouched() {
        let future = Utc::now() + Duration::days(3);
        assert_eq!(advanced_boundary(future, Utc::now()), future);
    }
}
