use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::{self, FilterType};
use image::DynamicImage;

use super::{Capability, CapabilityError, TransformOutput, TransformRequest};
use crate::imaging;

/// Grows the canvas to a requested aspect ratio without cropping: the source
/// sits centered over a blurred, stretched copy of itself that fills the new
/// frame. The social-media "blur pad".
pub struct ExtendCapability;

/// The backdrop is blurred at 1/8 scale and stretched back up. The upscale
/// smears it further, which is exactly the look, at a fraction of the cost
/// of blurring the full canvas.
const BACKDROP_DOWNSCALE: u32 = 8;
const BACKDROP_SIGMA: f32 = 4.0;

#[async_trait]
impl Capability for ExtendCapability {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> Result<TransformOutput, CapabilityError> {
        let src = &request.image;
        let ratio = request.options.ratio;
        let (sw, sh) = (src.width(), src.height());
        if sw == 0 || sh == 0 {
            return Err(CapabilityError::Processing("image has no pixels".to_string()));
        }

        // Smallest canvas of the requested proportions that contains the
        // source.
        let k = (sw.div_ceil(ratio.w)).max(sh.div_ceil(ratio.h)).max(1);
        let (tw, th) = (ratio.w * k, ratio.h * k);

        let backdrop = src
            .resize_exact(
                (tw / BACKDROP_DOWNSCALE).max(1),
                (th / BACKDROP_DOWNSCALE).max(1),
                FilterType::Triangle,
            )
            .blur(BACKDROP_SIGMA)
            .resize_exact(tw, th, FilterType::Triangle);

        let mut canvas = backdrop.to_rgba8();
        let ox = i64::from((tw - sw) / 2);
        let oy = i64::from((th - sh) / 2);
        imageops::overlay(&mut canvas, &src.to_rgba8(), ox, oy);

        let encoded = imaging::encode_png(&DynamicImage::ImageRgba8(canvas))?;
        Ok(TransformOutput::Binary(Bytes::from(encoded)))
    }
}
