use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, Rgba, RgbaImage};

use super::{Capability, CapabilityError, TransformOutput, TransformRequest};
use crate::imaging;

/// Lifts pen strokes off paper: adaptive mean thresholding on the luma
/// channel, strokes rendered opaque black on a transparent canvas.
///
/// A pixel counts as ink when it is darker than its neighborhood mean by a
/// fixed offset, which tolerates uneven lighting and paper tint far better
/// than a global threshold.
pub struct SignatureRipCapability;

const WINDOW_RADIUS: u32 = 7;
const MEAN_OFFSET: i32 = 10;

#[async_trait]
impl Capability for SignatureRipCapability {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> Result<TransformOutput, CapabilityError> {
        let luma = request.image.to_luma8();
        let (w, h) = luma.dimensions();
        if w == 0 || h == 0 {
            return Err(CapabilityError::Processing("image has no pixels".to_string()));
        }

        let integral = integral_image(&luma);
        let stride = (w + 1) as usize;

        let mut out = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
        for y in 0..h {
            for x in 0..w {
                let x0 = x.saturating_sub(WINDOW_RADIUS);
                let y0 = y.saturating_sub(WINDOW_RADIUS);
                let x1 = (x + WINDOW_RADIUS).min(w - 1);
                let y1 = (y + WINDOW_RADIUS).min(h - 1);

                let area = ((x1 - x0 + 1) * (y1 - y0 + 1)) as u64;
                let sum = integral[(y1 as usize + 1) * stride + x1 as usize + 1]
                    + integral[y0 as usize * stride + x0 as usize]
                    - integral[y0 as usize * stride + x1 as usize + 1]
                    - integral[(y1 as usize + 1) * stride + x0 as usize];
                let mean = (sum / area) as i32;

                let value = luma.get_pixel(x, y)[0] as i32;
                if value < mean - MEAN_OFFSET {
                    out.put_pixel(x, y, Rgba([0, 0, 0, 255]));
                }
            }
        }

        let encoded = imaging::encode_png(&DynamicImage::ImageRgba8(out))?;
        Ok(TransformOutput::Binary(Bytes::from(encoded)))
    }
}

/// Summed-area table with a zero row and column, so any window sum is four
/// lookups.
fn integral_image(luma: &image::GrayImage) -> Vec<u64> {
    let (w, h) = luma.dimensions();
    let stride = (w + 1) as usize;
    let mut integral = vec![0u64; stride * (h + 1) as usize];
    for y in 0..h as usize {
        let mut row_sum = 0u64;
        for x in 0..w as usize {
            row_sum += luma.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }
    integral
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::test_support::request_for;
    use image::{Luma, Rgb, RgbImage};

    fn scanned_signature() -> DynamicImage {
        // off-white paper with a dark horizontal stroke through the middle
        DynamicImage::ImageRgb8(RgbImage::from_fn(60, 40, |_, y| {
            if (18..22).contains(&y) {
                Rgb([25, 20, 30])
            } else {
                Rgb([235, 231, 225])
            }
        }))
    }

    #[tokio::test]
    async fn stroke_becomes_opaque_and_paper_transparent() {
        let out = SignatureRipCapability
            .transform(request_for(scanned_signature()))
            .await
            .unwrap();
        let bytes = match out {
            TransformOutput::Binary(b) => b,
            other => panic!("expected binary output, got {:?}", other),
        };
        let decoded = imaging::decode(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (60, 40));
        assert_eq!(decoded.get_pixel(30, 20)[3], 255, "stroke center should be ink");
        assert_eq!(decoded.get_pixel(30, 5)[3], 0, "paper should be transparent");
    }

    #[tokio::test]
    async fn featureless_page_yields_no_ink() {
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([240, 240, 240])));
        let out = SignatureRipCapability
            .transform(request_for(blank))
            .await
            .unwrap();
        let bytes = match out {
            TransformOutput::Binary(b) => b,
            other => panic!("expected binary output, got {:?}", other),
        };
        let decoded = imaging::decode(&bytes).unwrap().to_rgba8();
        assert!(decoded.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn integral_image_window_sums_check_out() {
        let img = image::GrayImage::from_fn(4, 3, |x, y| Luma([(x + y * 4) as u8]));
        let integral = integral_image(&img);
        let stride = 5;
        // whole-image sum: 0+1+...+11 = 66
        assert_eq!(integral[3 * stride + 4], 66);
    }
}
