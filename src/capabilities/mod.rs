//! Transformation capabilities behind the gateway.
//!
//! Every operation resolves to one [`Capability`] in the registry; the
//! gateway neither knows nor cares whether the work happens in-process or on
//! the inference backend. Five operations run locally on the `image` crate,
//! the rest proxy to the backend.

pub mod compress;
pub mod extend;
pub mod palette;
pub mod registry;
pub mod remote;
pub mod signature;
pub mod vectorize;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;
use thiserror::Error;

use crate::ops::params::TransformOptions;

/// Decoded, validated input for one transformation.
pub struct TransformRequest {
    /// Decoded upload. Local engines work on this.
    pub image: DynamicImage,
    /// The upload exactly as received. Remote capabilities forward these
    /// bytes rather than re-encoding the decoded copy.
    pub raw: Bytes,
    pub mask: Option<DynamicImage>,
    pub mask_raw: Option<Bytes>,
    pub options: TransformOptions,
}

/// What a capability produced. The gateway pairs this with the operation's
/// declared content type; a mismatch between variant and declaration is an
/// internal error.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutput {
    Binary(Bytes),
    Json(serde_json::Value),
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    /// In-process transformation failed.
    #[error("processing failed: {0}")]
    Processing(String),
    /// The inference backend returned an error or was unreachable.
    #[error("inference backend error: {0}")]
    Backend(String),
}

impl From<image::ImageError> for CapabilityError {
    fn from(e: image::ImageError) -> Self {
        CapabilityError::Processing(e.to_string())
    }
}

/// Uniform transformation contract: one image in, one result out.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn transform(&self, request: TransformRequest)
    -> Result<TransformOutput, CapabilityError>;
}
