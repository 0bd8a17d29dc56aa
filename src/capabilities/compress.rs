use async_trait::async_trait;
use bytes::Bytes;

use super::{Capability, CapabilityError, TransformOutput, TransformRequest};
use crate::imaging;

/// JPEG re-encode at the requested quality. Whatever came in goes out as a
/// flattened JPEG; that is the whole point of the route.
pub struct CompressCapability;

#[async_trait]
impl Capability for CompressCapability {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> Result<TransformOutput, CapabilityError> {
        let encoded = imaging::encode_jpeg(&request.image, request.options.quality)?;
        Ok(TransformOutput::Binary(Bytes::from(encoded)))
    }
}
