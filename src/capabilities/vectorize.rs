use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;

use super::{Capability, CapabilityError, TransformOutput, TransformRequest};

/// Monochrome raster-to-vector conversion: Otsu's threshold picks the
/// ink/background split, then every dark region's boundary is walked with
/// Moore-neighbor tracing and emitted as a filled SVG path. Holes come out
/// as their own contours and the even-odd fill rule keeps them open.
pub struct VectorizeCapability;

/// Contours shorter than this are sensor specks, not shapes.
const MIN_CONTOUR_POINTS: usize = 4;

#[async_trait]
impl Capability for VectorizeCapability {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> Result<TransformOutput, CapabilityError> {
        let luma = request.image.to_luma8();
        let (w, h) = luma.dimensions();
        if w == 0 || h == 0 {
            return Err(CapabilityError::Processing("image has no pixels".to_string()));
        }

        let mut histogram = [0u32; 256];
        for p in luma.pixels() {
            histogram[p[0] as usize] += 1;
        }
        let threshold = otsu_threshold(&histogram, w as u64 * h as u64);

        let mask: Vec<bool> = luma.pixels().map(|p| p[0] <= threshold).collect();
        let contours = trace_contours(&mask, w as usize, h as usize);

        let svg = render_svg(w, h, &contours);
        Ok(TransformOutput::Binary(Bytes::from(svg.into_bytes())))
    }
}

/// Threshold maximizing between-class variance over the luma histogram.
fn otsu_threshold(histogram: &[u32; 256], total: u64) -> u8 {
    let weighted_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(v, &count)| v as f64 * count as f64)
        .sum();

    let mut sum_below = 0.0f64;
    let mut weight_below = 0.0f64;
    let mut best_variance = 0.0f64;
    let mut best_threshold = 0u8;

    for t in 0..256 {
        weight_below += histogram[t] as f64;
        if weight_below == 0.0 {
            continue;
        }
        let weight_above = total as f64 - weight_below;
        if weight_above == 0.0 {
            break;
        }
        sum_below += t as f64 * histogram[t] as f64;
        let mean_below = sum_below / weight_below;
        let mean_above = (weighted_sum - sum_below) / weight_above;
        let variance = weight_below * weight_above * (mean_below - mean_above).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }
    best_threshold
}

/// Moore neighborhood enumerated clockwise from west.
const DIRS: [(isize, isize); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// Walks the boundary of every dark region (outer edges and hole edges both)
/// and returns them as pixel polygons. Tracing terminates when the walker
/// revisits a (pixel, backtrack) state, which bounds every walk by eight
/// times the boundary length.
fn trace_contours(mask: &[bool], w: usize, h: usize) -> Vec<Vec<(u32, u32)>> {
    let at = |x: isize, y: isize| -> bool {
        x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h && mask[y as usize * w + x as usize]
    };

    let mut visited = vec![false; w * h];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if !mask[idx] || visited[idx] {
                continue;
            }
            // boundary entry: the pixel to the west is background
            if x > 0 && mask[idx - 1] {
                continue;
            }

            let mut contour = vec![(x as u32, y as u32)];
            visited[idx] = true;

            let mut p = (x as isize, y as isize);
            let mut backtrack = 0usize;
            let mut seen_states: HashSet<((isize, isize), usize)> = HashSet::new();

            loop {
                if !seen_states.insert((p, backtrack)) {
                    break;
                }
                let mut advanced = false;
                for i in 1..=8 {
                    let d = (backtrack + i) % 8;
                    let q = (p.0 + DIRS[d].0, p.1 + DIRS[d].1);
                    if at(q.0, q.1) {
                        contour.push((q.0 as u32, q.1 as u32));
                        visited[q.1 as usize * w + q.0 as usize] = true;
                        backtrack = (d + 6) % 8;
                        p = q;
                        advanced = true;
                        break;
                    }
                }
                if !advanced {
                    break;
                }
            }

            if contour.len() >= MIN_CONTOUR_POINTS {
                contours.push(contour);
            }
        }
    }
    contours
}

/// Drops points that continue the previous direction, so straight runs
/// become single line segments.
fn compress_collinear(contour: &[(u32, u32)]) -> Vec<(u32, u32)> {
    if contour.len() < 3 {
        return contour.to_vec();
    }
    let mut out = vec![contour[0]];
    for i in 1..contour.len() - 1 {
        let (px, py) = contour[i - 1];
        let (cx, cy) = contour[i];
        let (nx, ny) = contour[i + 1];
        let d1 = (cx as i64 - px as i64, cy as i64 - py as i64);
        let d2 = (nx as i64 - cx as i64, ny as i64 - cy as i64);
        if d1 != d2 {
            out.push(contour[i]);
        }
    }
    out.push(contour[contour.len() - 1]);
    out
}

fn render_svg(w: u32, h: u32, contours: &[Vec<(u32, u32)>]) -> String {
    let mut d = String::new();
    for contour in contours {
        let points = compress_collinear(contour);
        let mut iter = points.iter();
        if let Some((x, y)) = iter.next() {
            d.push_str(&format!("M{} {}", x, y));
            for (x, y) in iter {
                d.push_str(&format!(" L{} {}", x, y));
            }
            d.push('Z');
        }
    }

    if d.is_empty() {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\"/>"
        )
    } else {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\"><path d=\"{d}\" fill=\"#000000\" fill-rule=\"evenodd\"/></svg>"
        )
    }
}
