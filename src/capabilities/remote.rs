use async_trait::async_trait;
use std::sync::Arc;

use super::{Capability, CapabilityError, TransformOutput, TransformRequest};
use crate::clients::InferenceClient;
use crate::ops::{Operation, OutputKind};

/// Proxy capability for operations served by the inference backend. The
/// original upload bytes travel as-is; only the option fields the bound
/// operation declares are forwarded.
pub struct RemoteCapability {
    operation: Operation,
    client: Arc<InferenceClient>,
}

impl RemoteCapability {
    pub fn new(operation: Operation, client: Arc<InferenceClient>) -> Self {
        Self { operation, client }
    }
}

#[async_trait]
impl Capability for RemoteCapability {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> Result<TransformOutput, CapabilityError> {
        let fields = request.options.form_fields(self.operation);
        let bytes = self
            .client
            .run_model(
                self.operation.model_id(),
                request.raw,
                request.mask_raw,
                &fields,
            )
            .await?;

        if self.operation.output() == OutputKind::Json {
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                CapabilityError::Backend(format!("model returned invalid JSON: {}", e))
            })?;
            Ok(TransformOutput::Json(value))
        } else {
            Ok(TransformOutput::Binary(bytes))
        }
    }
}
