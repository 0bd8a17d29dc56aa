use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::store::{SubscriberStore, advanced_boundary};
use crate::error::ApiError;
use crate::models::{PlanTier, Subscriber};

struct Row {
    subscriber: Subscriber,
    key_digest: String,
}

/// In-process subscriber store for development and tests.
///
/// Per-subscriber atomicity falls out of DashMap's entry locking: every
/// balance mutation happens under the row's shard guard, so two concurrent
/// reservations on the same subscriber serialize.
pub struct MemorySubscriberStore {
    rows: DashMap<Uuid, Row>,
    by_digest: DashMap<String, Uuid>,
    by_email: DashMap<String, Uuid>,
}

impl MemorySubscriberStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            by_digest: DashMap::new(),
            by_email: DashMap::new(),
        }
    }

    fn apply_period_reset(subscriber: &mut Subscriber) {
        let now = Utc::now();
        if subscriber.period_renews_at <= now {
            subscriber.credits_remaining = subscriber.tier.monthly_allowance();
            subscriber.period_renews_at = advanced_boundary(subscriber.period_renews_at, now);
        }
    }

    fn id_for_email(&self, email: &str) -> Option<Uuid> {
        self.by_email.get(email).map(|r| *r.value())
    }
}

impl Default for MemorySubscriberStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn find_by_key_digest(&self, digest: &str) -> Result<Option<Subscriber>, ApiError> {
        let id = match self.by_digest.get(digest) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let mut row = match self.rows.get_mut(&id) {
            Some(row) => row,
            None => return Ok(None),
        };
        if !row.subscriber.is_active {
            return Ok(None);
        }
        Self::apply_period_reset(&mut row.subscriber);
        Ok(Some(row.subscriber.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>, ApiError> {
        let id = match self.id_for_email(email) {
            Some(id) => id,
            None => return Ok(None),
        };
        let mut row = match self.rows.get_mut(&id) {
            Some(row) => row,
            None => return Ok(None),
        };
        Self::apply_period_reset(&mut row.subscriber);
        Ok(Some(row.subscriber.clone()))
    }

    async fn reserve_credit(&self, id: Uuid) -> Result<i64, ApiError> {
        let mut row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| ApiError::Unauthorized("unknown subscriber".to_string()))?;
        let subscriber = &mut row.subscriber;
        if !subscriber.is_active {
            return Err(ApiError::Unauthorized("subscription is cancelled".to_string()));
        }
        Self::apply_period_reset(subscriber);
        if subscriber.credits_remaining < 1 {
            return Err(ApiError::QuotaExceeded(
                "no credits remaining in the current billing period".to_string(),
            ));
        }
        subscriber.credits_remaining -= 1;
        subscriber.last_used_at = Some(Utc::now());
        Ok(subscriber.credits_remaining)
    }

    async fn release_credit(&self, id: Uuid) -> Result<(), ApiError> {
        let mut row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| ApiError::Unauthorized("unknown subscriber".to_string()))?;
        let subscriber = &mut row.subscriber;
        let allowance = subscriber.tier.monthly_allowance();
        subscriber.credits_remaining = (subscriber.credits_remaining + 1).min(allowance);
        Ok(())
    }

    async fn record_usage(&self, id: Uuid) -> Result<(), ApiError> {
        let mut row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| ApiError::Unauthorized("unknown subscriber".to_string()))?;
        row.subscriber.total_calls += 1;
        Ok(())
    }

    async fn insert(&self, subscriber: &Subscriber, key_digest: &str) -> Result<(), ApiError> {
        match self.by_email.entry(subscriber.email.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(ApiError::BadRequest("email is already registered".to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(subscriber.id);
            }
        }
        self.by_digest.insert(key_digest.to_string(), subscriber.id);
        self.rows.insert(
            subscriber.id,
            Row {
                subscriber: subscriber.clone(),
                key_digest: key_digest.to_string(),
            },
        );
        Ok(())
    }

    async fn upsert_with_key(
        &self,
        email: &str,
        name: Option<String>,
        tier: PlanTier,
        key_digest: &str,
    ) -> Result<Subscriber, ApiError> {
        if let Some(id) = self.id_for_email(email) {
            let (old_digest, snapshot) = {
                let mut row = self
                    .rows
                    .get_mut(&id)
                    .ok_or_else(|| ApiError::Database("email index out of sync".to_string()))?;
                let old_digest = std::mem::replace(&mut row.key_digest, key_digest.to_string());
                let subscriber = &mut row.subscriber;
                subscriber.tier = tier;
                subscriber.credits_remaining = tier.monthly_allowance();
                subscriber.period_renews_at = Utc::now() + chrono::Duration::days(30);
                subscriber.is_active = true;
                if name.is_some() {
                    subscriber.name = name.clone();
                }
                (old_digest, subscriber.clone())
            };
            self.by_digest.remove(&old_digest);
            self.by_digest.insert(key_digest.to_string(), id);
            return Ok(snapshot);
        }

        let subscriber = Subscriber::provision(email.to_string(), name, tier);
        self.insert(&subscriber, key_digest).await?;
        Ok(subscriber)
    }

    async fn change_tier(&self, email: &str, tier: PlanTier) -> Result<Subscriber, ApiError> {
        let id = self
            .id_for_email(email)
            .ok_or_else(|| ApiError::BadRequest("no subscriber for that email".to_string()))?;
        let mut row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| ApiError::Database("email index out of sync".to_string()))?;
        let subscriber = &mut row.subscriber;
        subscriber.tier = tier;
        subscriber.credits_remaining = tier.monthly_allowance();
        subscriber.period_renews_at = Utc::now() + chrono::Duration::days(30);
        Ok(subscriber.clone())
    }

    async fn set_active(&self, email: &str, active: bool) -> Result<(), ApiError> {
        let id = self
            .id_for_email(email)
            .ok_or_else(|| ApiError::BadRequest("no subscriber for that email".to_string()))?;
        let mut row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| ApiError::Database("email index out of sync".to_string()))?;
        row.subscriber.is_active = active;
        Ok(())
    }
}
