use actix_multipart::Multipart;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::error::ApiError;

/// An uploaded image plus the optional mask that erase-style operations
/// take alongside it.
pub struct ImageUpload {
    pub file: Bytes,
    pub mask: Option<Bytes>,
}

/// Drains a multipart body into memory. The image is taken from the `file`
/// field when present, otherwise from the first file-bearing field; a field
/// named `mask` is kept separately. Fields beyond `max_bytes` abort the
/// request before the rest of the body is read.
pub async fn collect_image_upload(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<ImageUpload, ApiError> {
    let mut file: Option<Vec<u8>> = None;
    let mut mask: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let content_disposition = field.content_disposition().ok_or_else(|| {
            ApiError::BadRequest("Content-Disposition header missing".to_string())
        })?;

        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| ApiError::BadRequest("Field name missing".to_string()))?
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError::BadRequest(format!(
                    "upload exceeds the {} byte limit",
                    max_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            continue;
        }

        match field_name.as_str() {
            "mask" => mask = Some(data),
            "file" => file = Some(data),
            _ => {
                if file.is_none() {
                    file = Some(data);
                }
            }
        }
    }

    let file = file.ok_or_else(|| {
        ApiError::BadRequest("no image provided in the multipart body".to_string())
    })?;

    Ok(ImageUpload {
        file: Bytes::from(file),
        mask: mask.map(Bytes::from),
    })
}
