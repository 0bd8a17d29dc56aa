use async_trait::async_trait;
use serde_json::json;

use super::{Capability, CapabilityError, TransformOutput, TransformRequest};

/// Dominant-color extraction: k-means over a downsampled pixel cloud,
/// clusters reported as hex strings ordered by population.
pub struct PaletteCapability;

const SAMPLE_EDGE: u32 = 64;
const MAX_ITERATIONS: usize = 12;

#[async_trait]
impl Capability for PaletteCapability {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> Result<TransformOutput, CapabilityError> {
        let points = sample_pixels(&request.image);
        let colors = dominant_colors(&points, request.options.palette_count)?;
        Ok(TransformOutput::Json(json!({ "colors": colors })))
    }
}

fn sample_pixels(image: &image::DynamicImage) -> Vec<[f32; 3]> {
    // thumbnail() also scales up, and its interpolation would invent blended
    // colors along hard edges; images already within bounds are sampled as-is
    let small = if image.width() > SAMPLE_EDGE || image.height() > SAMPLE_EDGE {
        image.thumbnail(SAMPLE_EDGE, SAMPLE_EDGE).to_rgb8()
    } else {
        image.to_rgb8()
    };
    small
        .pixels()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect()
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

/// Farthest-point seeding keeps the run deterministic for a given input, so
/// the same upload always yields the same palette.
fn initial_centroids(points: &[[f32; 3]], k: usize) -> Result<Vec<[f32; 3]>, CapabilityError> {
    let first = points
        .first()
        .copied()
        .ok_or_else(|| CapabilityError::Processing("image has no pixels".to_string()))?;
    let mut centroids = vec![first];
    while centroids.len() < k {
        let next = points
            .iter()
            .max_by(|a, b| {
                let da = centroids
                    .iter()
                    .map(|c| squared_distance(a, c))
                    .fold(f32::INFINITY, f32::min);
                let db = centroids
                    .iter()
                    .map(|c| squared_distance(b, c))
                    .fold(f32::INFINITY, f32::min);
                da.total_cmp(&db)
            })
            .copied()
            .ok_or_else(|| CapabilityError::Processing("image has no pixels".to_string()))?;
        centroids.push(next);
    }
    Ok(centroids)
}

fn dominant_colors(points: &[[f32; 3]], k: usize) -> Result<Vec<String>, CapabilityError> {
    let mut centroids = initial_centroids(points, k)?;
    let mut assignment = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let mut best = 0;
            let mut best_dist = f32::INFINITY;
            for (j, centroid) in centroids.iter().enumerate() {
                let d = squared_distance(point, centroid);
                if d < best_dist {
                    best_dist = d;
                    best = j;
                }
            }
            if assignment[i] != best {
                assignment[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![[0.0f32; 3]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(&assignment) {
            sums[cluster][0] += point[0];
            sums[cluster][1] += point[1];
            sums[cluster][2] += point[2];
            counts[cluster] += 1;
        }
        for j in 0..k {
            if counts[j] > 0 {
                centroids[j] = [
                    sums[j][0] / counts[j] as f32,
                    sums[j][1] / counts[j] as f32,
                    sums[j][2] / counts[j] as f32,
                ];
            }
        }

        if !changed {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &cluster in &assignment {
        counts[cluster] += 1;
    }

    let mut ranked: Vec<(usize, [f32; 3])> = counts
        .into_iter()
        .zip(centroids)
        .filter(|(count, _)| *count > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut colors = Vec::new();
    for (_, c) in ranked {
        let hex = format!(
            "#{:02x}{:02x}{:02x}",
            c[0].round().clamp(0.0, 255.0) as u8,
            c[1].round().clamp(0.0, 255.0) as u8,
            c[2].round().clamp(0.0, 255.0) as u8,
        );
        if !colors.contains(&hex) {
            colors.push(hex);
        }
    }
    Ok(colors)
}
