//! Feature extraction — grayscale, equalization, edges, block texture.
//!
//! Produces a fixed 128-dimensional descriptor from an RGB8 buffer:
//! 16 intensity-histogram bins + 16 edge-histogram bins + 12×8 block
//! texture means (96 features), L2-normalized as a whole.

use crate::types::Descriptor;
use thiserror::Error;

// --- Named constants ---
pub const DESCRIPTOR_DIM: usize = 128;
pub const HIST_BINS: usize = 16;
/// Texture grid: 12 columns × 8 rows = 96 block features, which together
/// with the two 16-bin histograms fill the 128 dimensions exactly.
pub const TEXTURE_GRID_COLS: usize = 12;
pub const TEXTURE_GRID_ROWS: usize = 8;
pub const PIPELINE_VERSION: &str = "hist-edge-v1";
/// Sobel magnitudes are clipped to the 8-bit pixel range before binning.
const EDGE_CLIP: f32 = 255.0;
const CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Extract a descriptor from a raw RGB8 pixel buffer.
///
/// The buffer must hold exactly `width * height * 3` bytes and the image
/// must be at least [`TEXTURE_GRID_COLS`] wide and [`TEXTURE_GRID_ROWS`]
/// tall so every texture block covers at least one pixel. Output length
/// is always [`DESCRIPTOR_DIM`].
pub fn extract(rgb: &[u8], width: u32, height: u32) -> Result<Descriptor, ExtractorError> {
    let w = width as usize;
    let h = height as usize;

    if w == 0 || h == 0 || rgb.is_empty() {
        return Err(ExtractorError::InvalidImage("empty pixel buffer".into()));
    }
    if rgb.len() != w * h * CHANNELS {
        return Err(ExtractorError::InvalidImage(format!(
            "expected {} bytes for {w}x{h} RGB, got {}",
            w * h * CHANNELS,
            rgb.len()
        )));
    }
    if w < TEXTURE_GRID_COLS || h < TEXTURE_GRID_ROWS {
        return Err(ExtractorError::InvalidImage(format!(
            "image {w}x{h} smaller than {TEXTURE_GRID_COLS}x{TEXTURE_GRID_ROWS} texture grid"
        )));
    }

    let mut gray = to_grayscale(rgb, w, h);
    equalize_histogram(&mut gray);
    let edges = sobel_magnitude(&gray, w, h);

    let gray_hist = normalized_histogram(&gray);
    let edge_hist = normalized_histogram_f32(&edges);
    let texture = block_texture(&edges, w, h);

    let mut values = Vec::with_capacity(DESCRIPTOR_DIM);
    values.extend_from_slice(&gray_hist);
    values.extend_from_slice(&edge_hist);
    values.extend_from_slice(&texture);
    debug_assert_eq!(values.len(), DESCRIPTOR_DIM);

    l2_normalize(&mut values);

    tracing::debug!(width, height, dim = values.len(), "descriptor extracted");

    Ok(Descriptor {
        values,
        pipeline_version: Some(PIPELINE_VERSION.to_string()),
    })
}

/// Decode an encoded image payload (PNG/JPEG/...) and extract a descriptor.
pub fn extract_from_bytes(bytes: &[u8]) -> Result<Descriptor, ExtractorError> {
    if bytes.is_empty() {
        return Err(ExtractorError::InvalidImage("empty image payload".into()));
    }
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ExtractorError::InvalidImage(format!("decode failed: {e}")))?;
    let rgb = decoded.to_rgb8();
    extract(rgb.as_raw(), rgb.width(), rgb.height())
}

/// Convert RGB8 to grayscale via ITU-R luminance weighting.
fn to_grayscale(rgb: &[u8], w: usize, h: usize) -> Vec<u8> {
    let mut gray = Vec::with_capacity(w * h);
    for px in rgb.chunks_exact(CHANNELS) {
        let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        gray.push(y.round().clamp(0.0, 255.0) as u8);
    }
    gray
}

/// Global histogram equalization — normalizes lighting variance so the
/// descriptor is stable across exposure changes.
fn equalize_histogram(gray: &mut [u8]) {
    let mut hist = [0u32; 256];
    for &p in gray.iter() {
        hist[p as usize] += 1;
    }

    let mut cdf = [0f32; 256];
    cdf[0] = hist[0] as f32;
    for i in 1..256 {
        cdf[i] = cdf[i - 1] + hist[i] as f32;
    }

    let cdf_min = cdf.iter().find(|&&v| v > 0.0).copied().unwrap_or(0.0);
    let denom = gray.len() as f32 - cdf_min;
    if denom <= 0.0 {
        // Degenerate single-intensity image; remap would divide by zero.
        return;
    }

    for p in gray.iter_mut() {
        let mapped = (cdf[*p as usize] - cdf_min) / denom * 255.0;
        *p = mapped.round().clamp(0.0, 255.0) as u8;
    }
}

/// 3×3 Sobel gradient magnitude, clipped to [0, 255].
///
/// Border pixels keep magnitude 0 — the kernel never reads out of bounds.
fn sobel_magnitude(gray: &[u8], w: usize, h: usize) -> Vec<f32> {
    const KX: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
    const KY: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

    let mut edges = vec![0f32; w * h];
    for y in 1..h.saturating_sub(1) {
        for x in 1..w - 1 {
            let mut gx = 0f32;
            let mut gy = 0f32;
            for ky in 0..3 {
                for kx in 0..3 {
                    let p = gray[(y + ky - 1) * w + (x + kx - 1)] as f32;
                    gx += KX[ky][kx] * p;
                    gy += KY[ky][kx] * p;
                }
            }
            edges[y * w + x] = (gx * gx + gy * gy).sqrt().min(EDGE_CLIP);
        }
    }
    edges
}

/// 16-bin normalized histogram of an 8-bit image (bins of width 16).
fn normalized_histogram(pixels: &[u8]) -> [f32; HIST_BINS] {
    let mut hist = [0f32; HIST_BINS];
    for &p in pixels {
        hist[(p as usize * HIST_BINS) / 256] += 1.0;
    }
    let n = pixels.len() as f32;
    for bin in hist.iter_mut() {
        *bin /= n;
    }
    hist
}

/// 16-bin normalized histogram of clipped edge magnitudes.
fn normalized_histogram_f32(pixels: &[f32]) -> [f32; HIST_BINS] {
    let mut hist = [0f32; HIST_BINS];
    for &p in pixels {
        let bin = ((p / EDGE_CLIP) * HIST_BINS as f32) as usize;
        hist[bin.min(HIST_BINS - 1)] += 1.0;
    }
    let n = pixels.len() as f32;
    for bin in hist.iter_mut() {
        *bin /= n;
    }
    hist
}

/// Mean normalized edge intensity per block of a 12×8 grid (96 features).
///
/// Trailing rows/columns that don't divide evenly are absorbed into the
/// last block of each row/column so every pixel contributes.
fn block_texture(edges: &[f32], w: usize, h: usize) -> Vec<f32> {
    let mut features = Vec::with_capacity(TEXTURE_GRID_COLS * TEXTURE_GRID_ROWS);
    let block_w = w / TEXTURE_GRID_COLS;
    let block_h = h / TEXTURE_GRID_ROWS;

    for row in 0..TEXTURE_GRID_ROWS {
        for col in 0..TEXTURE_GRID_COLS {
            let y0 = row * block_h;
            let x0 = col * block_w;
            let y1 = if row == TEXTURE_GRID_ROWS - 1 { h } else { y0 + block_h };
            let x1 = if col == TEXTURE_GRID_COLS - 1 { w } else { x0 + block_w };

            let mut sum = 0f32;
            for y in y0..y1 {
                for x in x0..x1 {
                    sum += edges[y * w + x];
                }
            }
            let count = ((y1 - y0) * (x1 - x0)) as f32;
            features.push(sum / count / EDGE_CLIP);
        }
    }
    features
}

/// L2-normalize in place. A zero vector is left untouched to avoid
/// division by zero.
fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic RGB test pattern with enough structure to produce
    /// non-trivial histograms and edges.
    fn test_image(w: usize, h: usize) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let v = ((x * 7 + y * 13) % 256) as u8;
                rgb.push(v);
                rgb.push(v.wrapping_add(40));
                rgb.push((x % 2 * 255) as u8);
            }
        }
        rgb
    }

    #[test]
    fn test_descriptor_dimension() {
        let rgb = test_image(64, 48);
        let d = extract(&rgb, 64, 48).unwrap();
        assert_eq!(d.len(), DESCRIPTOR_DIM);
        assert_eq!(d.pipeline_version.as_deref(), Some(PIPELINE_VERSION));
    }

    #[test]
    fn test_descriptor_deterministic() {
        let rgb = test_image(32, 32);
        let a = extract(&rgb, 32, 32).unwrap();
        let b = extract(&rgb, 32, 32).unwrap();
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_descriptor_unit_norm() {
        let rgb = test_image(40, 40);
        let d = extract(&rgb, 40, 40).unwrap();
        let norm: f32 = d.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm = {norm}");
    }

    #[test]
    fn test_empty_buffer_rejected() {
        assert!(matches!(extract(&[], 0, 0), Err(ExtractorError::InvalidImage(_))));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let rgb = vec![0u8; 300];
        assert!(extract(&rgb, 0, 100).is_err());
        assert!(extract(&rgb, 100, 0).is_err());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        // 16x16 RGB needs 768 bytes
        let rgb = vec![0u8; 700];
        assert!(matches!(extract(&rgb, 16, 16), Err(ExtractorError::InvalidImage(_))));
    }

    #[test]
    fn test_too_small_for_grid_rejected() {
        let rgb = vec![0u8; 4 * 4 * 3];
        assert!(extract(&rgb, 4, 4).is_err());
        // Tall enough but narrower than the 12-column grid
        let rgb = vec![0u8; 10 * 16 * 3];
        assert!(extract(&rgb, 10, 16).is_err());
    }

    #[test]
    fn test_feature_counts_fill_descriptor_exactly() {
        // Two 16-bin histograms plus the texture grid account for every
        // dimension of the declared descriptor length.
        assert_eq!(2 * HIST_BINS + TEXTURE_GRID_COLS * TEXTURE_GRID_ROWS, DESCRIPTOR_DIM);

        let rgb = test_image(32, 32);
        let d = extract(&rgb, 32, 32).unwrap();
        assert_eq!(d.len(), DESCRIPTOR_DIM);
        // Texture block occupies exactly the tail of the vector.
        assert_eq!(d.values[2 * HIST_BINS..].len(), TEXTURE_GRID_COLS * TEXTURE_GRID_ROWS);
    }

    #[test]
    fn test_flat_image_zero_edges() {
        // Uniform image: equalization degenerates, all edges zero, but the
        // gray histogram still carries mass — descriptor is valid.
        let rgb = vec![128u8; 16 * 16 * 3];
        let d = extract(&rgb, 16, 16).unwrap();
        assert_eq!(d.len(), DESCRIPTOR_DIM);
        // Edge histogram mass sits entirely in bin 0; texture features are 0.
        for &t in &d.values[2 * HIST_BINS..] {
            assert_eq!(t, 0.0);
        }
    }

    #[test]
    fn test_grayscale_luminance_weights() {
        // Pure red pixel → 0.299 * 255 ≈ 76
        let gray = to_grayscale(&[255, 0, 0], 1, 1);
        assert_eq!(gray[0], 76);
        // Pure green → 0.587 * 255 ≈ 150
        let gray = to_grayscale(&[0, 255, 0], 1, 1);
        assert_eq!(gray[0], 150);
    }

    #[test]
    fn test_equalization_spreads_range() {
        // Low-contrast ramp 100..110 should stretch toward 0..255
        let mut gray: Vec<u8> = (0..256).map(|i| 100 + (i % 11) as u8).collect();
        equalize_histogram(&mut gray);
        let min = *gray.iter().min().unwrap();
        let max = *gray.iter().max().unwrap();
        assert!(max - min > 200, "range {min}..{max} not stretched");
    }

    #[test]
    fn test_sobel_flat_is_zero() {
        let gray = vec![77u8; 10 * 10];
        let edges = sobel_magnitude(&gray, 10, 10);
        assert!(edges.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_sobel_vertical_edge_detected() {
        // Left half 0, right half 255: strong response along the seam.
        let w = 10;
        let h = 10;
        let gray: Vec<u8> = (0..w * h)
            .map(|i| if i % w < w / 2 { 0 } else { 255 })
            .collect();
        let edges = sobel_magnitude(&gray, w, h);
        let seam = edges[5 * w + w / 2];
        assert!(seam > 0.0, "no response at seam");
        assert!(seam <= EDGE_CLIP);
    }

    #[test]
    fn test_histogram_sums_to_one() {
        let pixels: Vec<u8> = (0..=255).collect();
        let hist = normalized_histogram(&pixels);
        let sum: f32 = hist.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        // Uniform distribution → equal bins
        for &b in &hist {
            assert!((b - 1.0 / HIST_BINS as f32).abs() < 1e-5);
        }
    }

    #[test]
    fn test_extract_from_bytes_rejects_garbage() {
        assert!(extract_from_bytes(&[0xde, 0xad, 0xbe, 0xef]).is_err());
        assert!(extract_from_bytes(&[]).is_err());
    }
}
