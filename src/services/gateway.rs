use bytes::Bytes;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::rate_limiter::RateLimiter;
use crate::capabilities::registry::CapabilityRegistry;
use crate::capabilities::{TransformOutput, TransformRequest};
use crate::db::SubscriberStore;
use crate::error::ApiError;
use crate::imaging;
use crate::models::Subscriber;
use crate::ops::params::{RawOptions, TransformOptions};
use crate::ops::{Operation, OutputKind};
use crate::security::api_keys::hash_api_key;

/// Successful transformation plus the metering facts the handler surfaces.
#[derive(Debug)]
pub struct GatewayResponse {
    pub output: TransformOutput,
    pub content_type: &'static str,
    pub credits_remaining: i64,
}

/// The request pipeline behind every metered route:
/// authorize → throttle → tier gate → credit gate → decode → dispatch.
///
/// Credits follow spent-on-success semantics: the balance is taken with an
/// atomic conditional decrement right before dispatch and refunded if the
/// capability fails or runs out its budget, so a caller never pays for a
/// failed call and concurrent callers can never overdraw the allowance.
pub struct GatewayService {
    store: Arc<dyn SubscriberStore>,
    registry: Arc<CapabilityRegistry>,
    limiter: Arc<RateLimiter>,
    hmac_secret: String,
}

impl GatewayService {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        registry: Arc<CapabilityRegistry>,
        hmac_secret: String,
    ) -> Self {
        Self {
            store,
            registry,
            limiter: Arc::new(RateLimiter::new()),
            hmac_secret,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Resolves a presented API key to its active subscriber.
    pub async fn authenticate(&self, presented_key: &str) -> Result<Subscriber, ApiError> {
        let digest = hash_api_key(presented_key, &self.hmac_secret)?;
        self.store
            .find_by_key_digest(&digest)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("invalid API key".to_string()))
    }

    pub async fn execute(
        &self,
        api_key: &str,
        op: Operation,
        payload: Bytes,
        mask: Option<Bytes>,
        raw_options: &RawOptions,
    ) -> Result<GatewayResponse, ApiError> {
        let subscriber = self.authenticate(api_key).await?;
        self.execute_for(subscriber, op, payload, mask, raw_options)
            .await
    }

    /// The pipeline after authentication. Handlers call
    /// [`authenticate`](Self::authenticate) first so a bad key is rejected
    /// before the upload is drained.
    #[instrument(skip(self, subscriber, payload, mask, raw_options), fields(op = %op.route(), subscriber = %subscriber.id))]
    pub async fn execute_for(
        &self,
        subscriber: Subscriber,
        op: Operation,
        payload: Bytes,
        mask: Option<Bytes>,
        raw_options: &RawOptions,
    ) -> Result<GatewayResponse, ApiError> {
        self.limiter.check(subscriber.id, subscriber.tier)?;
        op.ensure_allowed(subscriber.tier)?;

        // Non-mutating credit gate; the authoritative decrement comes after
        // the payload has proven decodable.
        if subscriber.credits_remaining < 1 {
            return Err(ApiError::QuotaExceeded(
                "no credits remaining in the current billing period".to_string(),
            ));
        }

        let options = TransformOptions::resolve(op, raw_options)?;
        let image = imaging::decode(&payload)
            .map_err(|e| ApiError::BadRequest(format!("could not decode image: {}", e)))?;
        let mask_image = match (op.requires_mask(), &mask) {
            (true, None) => {
                return Err(ApiError::BadRequest(
                    "this operation requires a mask file".to_string(),
                ));
            }
            (true, Some(bytes)) => Some(
                imaging::decode(bytes)
                    .map_err(|e| ApiError::BadRequest(format!("could not decode mask: {}", e)))?,
            ),
            (false, _) => None,
        };

        let capability = self.registry.get(op).ok_or_else(|| {
            ApiError::Internal(format!("no capability registered for {}", op.route()))
        })?;

        let credits_remaining = self.store.reserve_credit(subscriber.id).await?;

        let request = TransformRequest {
            image,
            raw: payload,
            mask: mask_image,
            mask_raw: mask,
            options,
        };

        let output = match timeout(op.time_budget(), capability.transform(request)).await {
            Err(_elapsed) => {
                self.refund(subscriber.id).await;
                return Err(ApiError::Timeout(format!(
                    "operation did not complete within {} seconds",
                    op.time_budget().as_secs()
                )));
            }
            Ok(Err(err)) => {
                warn!("capability for {} failed: {}", op.route(), err);
                self.refund(subscriber.id).await;
                return Err(ApiError::Internal(format!("transformation failed: {}", err)));
            }
            Ok(Ok(output)) => output,
        };

        let declared_json = op.output() == OutputKind::Json;
        let produced_json = matches!(output, TransformOutput::Json(_));
        if declared_json != produced_json {
            self.refund(subscriber.id).await;
            return Err(ApiError::Internal(format!(
                "capability for {} produced output of the wrong kind",
                op.route()
            )));
        }

        if let Err(e) = self.store.record_usage(subscriber.id).await {
            warn!("usage counter update failed for {}: {}", subscriber.id, e);
        }
        info!(
            "{} completed for {} ({} credits left)",
            op.route(),
            subscriber.id,
            credits_remaining
        );

        Ok(GatewayResponse {
            output,
            content_type: op.output().content_type(),
            credits_remaining,
        })
    }

    /// Returns a reserved credit after a failed dispatch. A refund that
    /// itself fails only loses one credit of one subscriber, so it is
    /// logged rather than turned into a second user-facing error.
    async fn refund(&self, id: Uuid) {
        if let Err(e) = self.store.release_credit(id).await {
            log::error!("credit refund failed for subscriber {}: {}", id, e);
        }
    }
}
