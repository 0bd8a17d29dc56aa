use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::postgres::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use super::store::{SubscriberStore, advanced_boundary};
use crate::error::ApiError;
use crate::models::{PlanTier, Subscriber};

const SUBSCRIBER_COLUMNS: &str = "id, email, name, tier, credits_remaining, monthly_allowance, \
     period_renews_at, is_active, total_calls, created_at, last_used_at";

#[derive(Debug, FromRow)]
struct SubscriberRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    tier: String,
    credits_remaining: i64,
    #[allow(dead_code)]
    monthly_allowance: i64,
    period_renews_at: DateTime<Utc>,
    is_active: bool,
    total_calls: i64,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = ApiError;

    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        let tier = PlanTier::from_str(&row.tier)
            .map_err(|e| ApiError::Database(format!("subscriber {} has {}", row.id, e)))?;
        Ok(Subscriber {
            id: row.id,
            email: row.email,
            name: row.name,
            tier,
            credits_remaining: row.credits_remaining,
            period_renews_at: row.period_renews_at,
            is_active: row.is_active,
            total_calls: row.total_calls,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        })
    }
}

/// Production subscriber store over Postgres.
///
/// The credit decrement is one conditional UPDATE, so concurrency control
/// rides on the database's row locking rather than anything in-process. The
/// `monthly_allowance` column is denormalized from the tier so refund
/// clamping and period resets stay single statements too.
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the lazy 30-day reset when a row's period boundary has
    /// passed. The UPDATE is guarded on the old boundary; losing that race
    /// to another worker just means re-reading the row they fixed.
    async fn maybe_reset(&self, row: SubscriberRow) -> Result<SubscriberRow, ApiError> {
        let now = Utc::now();
        if row.period_renews_at > now {
            return Ok(row);
        }
        let new_boundary = advanced_boundary(row.period_renews_at, now);

        let query = format!(
            "UPDATE subscribers SET credits_remaining = monthly_allowance, period_renews_at = $1 \
             WHERE id = $2 AND period_renews_at = $3 RETURNING {}",
            SUBSCRIBER_COLUMNS
        );
        let updated = sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(new_boundary)
            .bind(row.id)
            .bind(row.period_renews_at)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(fresh) => Ok(fresh),
            None => {
                let query =
                    format!("SELECT {} FROM subscribers WHERE id = $1", SUBSCRIBER_COLUMNS);
                let fresh = sqlx::query_as::<_, SubscriberRow>(&query)
                    .bind(row.id)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(fresh)
            }
        }
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Option<SubscriberRow>, ApiError> {
        let query = format!("SELECT {} FROM subscribers WHERE id = $1", SUBSCRIBER_COLUMNS);
        let row = sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn try_decrement(&self, id: Uuid) -> Result<Option<i64>, ApiError> {
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE subscribers \
             SET credits_remaining = credits_remaining - 1, last_used_at = NOW() \
             WHERE id = $1 AND is_active = TRUE AND credits_remaining >= 1 \
             RETURNING credits_remaining",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn find_by_key_digest(&self, digest: &str) -> Result<Option<Subscriber>, ApiError> {
        let query = format!(
            "SELECT {} FROM subscribers WHERE key_digest = $1 AND is_active = TRUE",
            SUBSCRIBER_COLUMNS
        );
        let row = sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(digest)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let row = self.maybe_reset(row).await?;
                Ok(Some(row.try_into()?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>, ApiError> {
        let query = format!("SELECT {} FROM subscribers WHERE email = $1", SUBSCRIBER_COLUMNS);
        let row = sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let row = self.maybe_reset(row).await?;
                Ok(Some(row.try_into()?))
            }
            None => Ok(None),
        }
    }

    async fn reserve_credit(&self, id: Uuid) -> Result<i64, ApiError> {
        if let Some(balance) = self.try_decrement(id).await? {
            return Ok(balance);
        }

        // The fast path failed: either the subscriber is gone, cancelled,
        // out of credits, or an elapsed period is still waiting for its
        // reset. Only the last case deserves a retry.
        let row = self
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown subscriber".to_string()))?;
        if !row.is_active {
            return Err(ApiError::Unauthorized("subscription is cancelled".to_string()));
        }
        if row.period_renews_at <= Utc::now() {
            self.maybe_reset(row).await?;
            if let Some(balance) = self.try_decrement(id).await? {
                return Ok(balance);
            }
        }
        Err(ApiError::QuotaExceeded(
            "no credits remaining in the current billing period".to_string(),
        ))
    }

    async fn release_credit(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE subscribers \
             SET credits_remaining = LEAST(credits_remaining + 1, monthly_allowance) \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Unauthorized("unknown subscriber".to_string()));
        }
        Ok(())
    }

    async fn record_usage(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE subscribers SET total_calls = total_calls + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert(&self, subscriber: &Subscriber, key_digest: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO subscribers \
             (id, email, name, tier, key_digest, credits_remaining, monthly_allowance, \
              period_renews_at, is_active, total_calls, created_at, last_used_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(subscriber.id)
        .bind(&subscriber.email)
        .bind(&subscriber.name)
        .bind(subscriber.tier.as_str())
        .bind(key_digest)
        .bind(subscriber.credits_remaining)
        .bind(subscriber.tier.monthly_allowance())
        .bind(subscriber.period_renews_at)
        .bind(subscriber.is_active)
        .bind(subscriber.total_calls)
        .bind(subscriber.created_at)
        .bind(subscriber.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::BadRequest("email is already registered".to_string())
            }
            _ => ApiError::from(e),
        })?;
        Ok(())
    }

    async fn upsert_with_key(
        &self,
        email: &str,
        name: Option<String>,
        tier: PlanTier,
        key_digest: &str,
    ) -> Result<Subscriber, ApiError> {
        let fresh = Subscriber::provision(email.to_string(), name, tier);
        let query = format!(
            "INSERT INTO subscribers \
             (id, email, name, tier, key_digest, credits_remaining, monthly_allowance, \
              period_renews_at, is_active, total_calls, created_at, last_used_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, 0, $9, NULL) \
             ON CONFLICT (email) DO UPDATE SET \
               tier = EXCLUDED.tier, \
               key_digest = EXCLUDED.key_digest, \
               credits_remaining = EXCLUDED.credits_remaining, \
               monthly_allowance = EXCLUDED.monthly_allowance, \
               period_renews_at = EXCLUDED.period_renews_at, \
               is_active = TRUE, \
               name = COALESCE(EXCLUDED.name, subscribers.name) \
             RETURNING {}",
            SUBSCRIBER_COLUMNS
        );
        let row = sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(fresh.id)
            .bind(&fresh.email)
            .bind(&fresh.name)
            .bind(tier.as_str())
            .bind(key_digest)
            .bind(tier.monthly_allowance())
            .bind(tier.monthly_allowance())
            .bind(fresh.period_renews_at)
            .bind(fresh.created_at)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn change_tier(&self, email: &str, tier: PlanTier) -> Result<Subscriber, ApiError> {
        let query = format!(
            "UPDATE subscribers \
             SET tier = $2, credits_remaining = $3, monthly_allowance = $3, \
                 period_renews_at = $4 \
             WHERE email = $1 RETURNING {}",
            SUBSCRIBER_COLUMNS
        );
        let row = sqlx::query_as::<_, SubscriberRow>(&query)
            .bind(email)
            .bind(tier.as_str())
            .bind(tier.monthly_allowance())
            .bind(Utc::now() + chrono::Duration::days(30))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::BadRequest("no subscriber for that email".to_string()))?;
        row.try_into()
    }

    async fn set_active(&self, email: &str, active: bool) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE subscribers SET is_active = $2 WHERE email = $1")
            .bind(email)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::BadRequest("no subscriber for that email".to_string()));
        }
        Ok(())
    }
}
