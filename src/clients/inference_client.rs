use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::capabilities::CapabilityError;
use crate::config::settings::InferenceConfig;
use crate::error::ApiError;

/// HTTP client for the model-serving backend that executes the heavy
/// operations. One instance is shared across workers; reqwest pools the
/// connections underneath.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self, ApiError> {
        // Overall deadlines come from each operation's time budget at the
        // dispatch site; the client only bounds connection establishment.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ApiError::Configuration(format!("Failed to build inference HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// Runs one model invocation: multipart upload of the image (plus an
    /// optional mask and option fields), raw response bytes back.
    #[instrument(skip(self, file, mask), fields(model = %model, bytes = file.len()))]
    pub async fn run_model(
        &self,
        model: &str,
        file: Bytes,
        mask: Option<Bytes>,
        fields: &[(&'static str, String)],
    ) -> Result<Bytes, CapabilityError> {
        let url = format!("{}/v1/models/{}", self.base_url, model);

        let file_part = Part::bytes(file.to_vec())
            .file_name("upload.bin")
            .mime_str("application/octet-stream")
            .map_err(|e| CapabilityError::Backend(format!("invalid upload mime type: {}", e)))?;
        let mut form = Form::new().part("file", file_part);

        if let Some(mask_bytes) = mask {
            let mask_part = Part::bytes(mask_bytes.to_vec())
                .file_name("mask.bin")
                .mime_str("application/octet-stream")
                .map_err(|e| CapabilityError::Backend(format!("invalid mask mime type: {}", e)))?;
            form = form.part("mask", mask_part);
        }
        for (name, value) in fields {
            form = form.text(*name, value.clone());
        }

        let mut request = self.client.post(&url).multipart(form);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!("inference backend unreachable: {}", e);
            CapabilityError::Backend(format!("request to model {} failed: {}", model, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "no response body".to_string());
            let detail: String = detail.chars().take(200).collect();
            return Err(CapabilityError::Backend(format!(
                "model {} returned {}: {}",
                model, status, detail
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            CapabilityError::Backend(format!("reading model {} response failed: {}", model, e))
        })?;
        debug!("model {} returned {} bytes", model, bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::ServerGuard) -> InferenceClient {
        InferenceClient::new(&InferenceConfig {
            base_url: server.url(),
            api_token: Some("test-token".to_string()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn posts_multipart_with_bearer_and_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/models/realesrgan-x4")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(vec![9u8, 8, 7])
            .create_async()
            .await;

        let client = client_for(&server);
        let out = client
            .run_model("realesrgan-x4", Bytes::from_static(b"fake image"), None, &[])
            .await
            .unwrap();

        assert_eq!(out.as_ref(), &[9u8, 8, 7]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn backend_failure_surfaces_status_and_detail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/models/lama-inpaint")
            .with_status(503)
            .with_body("gpu pool exhausted")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .run_model(
                "lama-inpaint",
                Bytes::from_static(b"img"),
                Some(Bytes::from_static(b"mask")),
                &[],
            )
            .await
            .unwrap_err();

        match err {
            CapabilityError::Backend(msg) => {
                assert!(msg.contains("503"), "{}", msg);
                assert!(msg.contains("gpu pool exhausted"), "{}", msg);
            }
            other => panic!("expected backend error, got {}", other),
        }
    }

    #[tokio::test]
    async fn option_fields_travel_as_form_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/models/portrait-depth-blur")
            .match_body(mockito::Matcher::Regex("blur_strength".to_string()))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .run_model(
                "portrait-depth-blur",
                Bytes::from_static(b"img"),
                None,
                &[("blur_strength", "30".to_string())],
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
