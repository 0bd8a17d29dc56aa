use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::tier::PlanTier;

/// One account: an API key holder with a tier and a credit balance.
///
/// The plaintext API key is never stored; stores index subscribers by the
/// HMAC digest of the key. This struct is the store-agnostic view handed to
/// the gateway after authentication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub tier: PlanTier,
    pub credits_remaining: i64,
    /// End of the current 30-day billing period. Crossing it resets the
    /// balance to the tier allowance.
    pub period_renews_at: DateTime<Utc>,
    pub is_active: bool,
    pub total_calls: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Fresh subscriber at the given tier with a full allowance and a
    /// billing period starting now.
    pub fn provision(email: String, name: Option<String>, tier: PlanTier) -> Self {
        let now = Utc::now();
        Subscriber {
            id: Uuid::new_v4(),
            email,
            name,
            tier,
            credits_remaining: tier.monthly_allowance(),
            period_renews_at: now + chrono::Duration::days(30),
            is_active: true,
            total_calls: 0,
            created_at: now,
            last_used_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_grants_full_allowance() {
        let s = Subscriber::provision("a@b.co".into(), None, PlanTier::Starter);
        assert_eq!(s.credits_remaining, 1_000);
        assert!(s.is_active);
        assert_eq!(s.total_calls, 0);
        assert!(s.period_renews_at > Utc::now());
    }
}
