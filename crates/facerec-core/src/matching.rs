//! Template matching with the mean-subtracted normalized cross-correlation
//! coefficient.
//!
//! For a template `T` placed at offset `(x, y)` over image `I`:
//!
//! ```text
//!            Σ (T - mean T) · (I_xy - mean I_xy)
//! R(x, y) = ------------------------------------
//!           sqrt( Σ (T - mean T)² · Σ (I_xy - mean I_xy)² )
//! ```
//!
//! where `I_xy` is the image window under the template. Scores lie in [-1, 1].
//! Window sums come from integral images, so each offset costs one pass over
//! the template.

use image::GrayImage;

/// Dense map of correlation scores, one per valid template offset.
#[derive(Debug, Clone)]
pub struct ScoreMap {
    pub width: u32,
    pub height: u32,
    scores: Vec<f32>,
}

impl ScoreMap {
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.scores.get((y * self.width + x) as usize).copied()
    }

    /// Highest score and its offset. The first offset in row-major order wins ties.
    pub fn max(&self) -> (f32, (u32, u32)) {
        let mut best = f32::NEG_INFINITY;
        let mut best_idx = 0usize;
        for (i, &s) in self.scores.iter().enumerate() {
            if s > best {
                best = s;
                best_idx = i;
            }
        }
        let idx = best_idx as u32;
        (best, (idx % self.width, idx / self.width))
    }

    pub fn max_value(&self) -> f32 {
        self.max().0
    }
}

/// Summed-area tables of pixel values and squared pixel values.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        let w = image.width() as usize;
        let h = image.height() as usize;
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];
        let raw = image.as_raw();

        for y in 0..h {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let p = raw[y * w + x] as u64;
                row += p;
                row_sq += p * p;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }

        Self { stride, sum, sum_sq }
    }

    /// (Σ p, Σ p²) over the `w` × `h` window at `(x, y)`.
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let at = |table: &[u64], xx: usize, yy: usize| table[yy * self.stride + xx];
        let area = |table: &[u64]| {
            at(table, x + w, y + h) + at(table, x, y) - at(table, x + w, y) - at(table, x, y + h)
        };
        (area(&self.sum) as f64, area(&self.sum_sq) as f64)
    }
}

/// Slide `template` over `image` and score every offset.
///
/// Returns `None` when the template is empty or larger than the image in
/// either dimension. Offsets where the window or the template has no
/// variance score 0.0.
pub fn ccoeff_normed(image: &GrayImage, template: &GrayImage) -> Option<ScoreMap> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let n = (tw * th) as f64;
    let t_raw = template.as_raw();
    let t_mean = t_raw.iter().map(|&p| p as f64).sum::<f64>() / n;
    let t_centered: Vec<f64> = t_raw.iter().map(|&p| p as f64 - t_mean).collect();
    let t_norm = t_centered.iter().map(|v| v * v).sum::<f64>().sqrt();

    let integral = IntegralImage::new(image);
    let i_raw = image.as_raw();
    let (iw, tw, th) = (iw as usize, tw as usize, th as usize);
    let out_w = iw - tw + 1;
    let out_h = ih as usize - th + 1;

    let mut scores = Vec::with_capacity(out_w * out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            // Σ(T - mean T) = 0, so the window mean drops out of the numerator.
            let mut num = 0.0f64;
            for ty in 0..th {
                let img_row = &i_raw[(oy + ty) * iw + ox..(oy + ty) * iw + ox + tw];
                let tmpl_row = &t_centered[ty * tw..(ty + 1) * tw];
                num += tmpl_row
                    .iter()
                    .zip(img_row)
                    .map(|(t, &p)| t * p as f64)
                    .sum::<f64>();
            }

            let (sum, sum_sq) = integral.window(ox, oy, tw, th);
            let window_var = (sum_sq - sum * sum / n).max(0.0);
            scores.push(normalize_score(num, window_var.sqrt() * t_norm));
        }
    }

    Some(ScoreMap {
        width: out_w as u32,
        height: out_h as u32,
        scores,
    })
}

/// Best score of `template` anywhere inside `image`.
pub fn best_score(image: &GrayImage, template: &GrayImage) -> Option<f32> {
    ccoeff_normed(image, template).map(|map| map.max_value())
}

/// Divide by the norm product, absorbing rounding overshoot past ±1.
fn normalize_score(num: f64, denom: f64) -> f32 {
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let r = if num.abs() < denom {
        num / denom
    } else if num.abs() < denom * 1.125 {
        num.signum()
    } else {
        0.0
    };
    r as f32
}
