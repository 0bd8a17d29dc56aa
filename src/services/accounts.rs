use std::sync::Arc;
use tracing::info;

use crate::db::SubscriberStore;
use crate::error::ApiError;
use crate::models::{PlanTier, Subscriber};
use crate::security::api_keys::{generate_api_key, hash_api_key};

/// A freshly minted key together with the account it unlocks. The plaintext
/// key exists only in this struct on its way to the HTTP response; the store
/// keeps the digest.
#[derive(Debug)]
pub struct IssuedKey {
    pub api_key: String,
    pub subscriber: Subscriber,
}

/// Account issuance and lifecycle: self-serve signup plus the
/// billing-partner webhook mutations.
pub struct AccountService {
    store: Arc<dyn SubscriberStore>,
    hmac_secret: String,
}

impl AccountService {
    pub fn new(store: Arc<dyn SubscriberStore>, hmac_secret: String) -> Self {
        Self { store, hmac_secret }
    }

    /// Provisions a new subscriber and returns the one-time plaintext key.
    /// Duplicate emails surface as BadRequest from the store's unique
    /// constraint, so two racing signups cannot both win.
    pub async fn signup(
        &self,
        email: &str,
        name: Option<String>,
        tier: PlanTier,
    ) -> Result<IssuedKey, ApiError> {
        let email = normalize_email(email)?;
        let api_key = generate_api_key();
        let digest = hash_api_key(&api_key, &self.hmac_secret)?;
        let subscriber = Subscriber::provision(email, name, tier);
        self.store.insert(&subscriber, &digest).await?;
        info!("issued {} key for {}", tier, subscriber.email);
        Ok(IssuedKey { api_key, subscriber })
    }

    /// Billing partner reported a new (or renewed) subscription: create or
    /// reactivate the account at the paid tier and rotate its key.
    pub async fn activate_subscription(
        &self,
        email: &str,
        name: Option<String>,
        tier: PlanTier,
    ) -> Result<IssuedKey, ApiError> {
        let email = normalize_email(email)?;
        let api_key = generate_api_key();
        let digest = hash_api_key(&api_key, &self.hmac_secret)?;
        let subscriber = self
            .store
            .upsert_with_key(&email, name, tier, &digest)
            .await?;
        info!("subscription activated at {} for {}", tier, email);
        Ok(IssuedKey { api_key, subscriber })
    }

    /// Upgrade or downgrade in place. The existing key keeps working; the
    /// balance resets to the new tier's allowance.
    pub async fn change_tier(&self, email: &str, tier: PlanTier) -> Result<Subscriber, ApiError> {
        let email = normalize_email(email)?;
        let subscriber = self.store.change_tier(&email, tier).await?;
        info!("tier changed to {} for {}", tier, email);
        Ok(subscriber)
    }

    /// Cancellation deactivates the account; the key stops resolving on the
    /// next request.
    pub async fn cancel(&self, email: &str) -> Result<(), ApiError> {
        let email = normalize_email(email)?;
        self.store.set_active(&email, false).await?;
        info!("subscription cancelled for {}", email);
        Ok(())
    }
}

/// Lowercases and sanity-checks an email. Full RFC validation is the mail
/// provider's problem; this only rejects strings that cannot possibly
/// deliver.
fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid {
        return Err(ApiError::BadRequest(
            "a valid email address is required".to_string(),
        ));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemorySubscriberStore;
    use crate::security::api_keys::KEY_PREFIX;

    const SECRET: &str = "accounts-test-secret";

    fn service() -> (AccountService, Arc<MemorySubscriberStore>) {
        let store = Arc::new(MemorySubscriberStore::new());
        (AccountService::new(store.clone(), SECRET.to_string()), store)
    }

    #[tokio::test]
    async fn signup_issues_a_resolvable_key() {
        let (service, store) = service();
        let issued = service
            .signup("NEW@Example.com", Some("New User".into()), PlanTier::Free)
            .await
            .unwrap();

        assert!(issued.api_key.starts_with(KEY_PREFIX));
        assert_eq!(issued.subscriber.email, "new@example.com");
        assert_eq!(issued.subscriber.credits_remaining, 50);

        let digest = hash_api_key(&issued.api_key, SECRET).unwrap();
        let found = store.find_by_key_digest(&digest).await.unwrap().unwrap();
        assert_eq!(found.id, issued.subscriber.id);
    }

    #[tokio::test]
    async fn second_signup_with_same_email_is_rejected() {
        let (service, _store) = service();
        service
            .signup("dup@example.com", None, PlanTier::Free)
            .await
            .unwrap();
        let err = service
            .signup("dup@example.com", None, PlanTier::Pro)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn malformed_emails_are_rejected() {
        let (service, _store) = service();
        for bad in ["", "nope", "@example.com", "user@", "user@nodot", "user@dot."] {
            let err = service.signup(bad, None, PlanTier::Free).await.unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{:?} should fail", bad);
        }
    }

    #[tokio::test]
    async fn activation_rotates_keys_and_resets_the_ledger() {
        let (service, store) = service();
        let first = service
            .signup("payer@example.com", None, PlanTier::Free)
            .await
            .unwrap();

        let second = service
            .activate_subscription("payer@example.com", None, PlanTier::Pro)
            .await
            .unwrap();
        assert_ne!(first.api_key, second.api_key);
        assert_eq!(second.subscriber.tier, PlanTier::Pro);
        assert_eq!(second.subscriber.credits_remaining, 10_000);

        let stale = hash_api_key(&first.api_key, SECRET).unwrap();
        assert!(store.find_by_key_digest(&stale).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_stops_key_resolution() {
        let (service, store) = service();
        let issued = service
            .signup("leaver@example.com", None, PlanTier::Starter)
            .await
            .unwrap();
        service.cancel("leaver@example.com").await.unwrap();

        let digest = hash_api_key(&issued.api_key, SECRET).unwrap();
        assert!(store.find_by_key_digest(&digest).await.unwrap().is_none());
    }
}
