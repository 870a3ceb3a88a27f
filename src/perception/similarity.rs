/// Structural similarity (SSIM) between a screen region and a reference photo
///
/// Mean SSIM over a 7x7 uniform window with sample covariance, constants
/// K1 = 0.01, K2 = 0.03 and an 8-bit data range. Border pixels whose window
/// would leave the image are excluded from the mean.
use image::imageops::{resize, FilterType};
use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use super::{crop, to_gray, Detection};
use crate::config::Region;

const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Summed-area table with a zero row and column in front
struct Integral {
    width: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { width, sums }
    }

    /// Sum over the window whose top-left corner is (x, y)
    fn window(&self, x: usize, y: usize) -> f64 {
        let stride = self.width + 1;
        let (x1, y1) = (x + WINDOW, y + WINDOW);
        self.sums[y1 * stride + x1] - self.sums[y * stride + x1] - self.sums[y1 * stride + x]
            + self.sums[y * stride + x]
    }
}

/// Mean SSIM of two equally sized grayscale images
///
/// # Returns
/// `None` when the sizes differ or either side is smaller than the window.
pub fn ssim(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let (width, height) = (a.width() as usize, a.height() as usize);
    if width < WINDOW || height < WINDOW {
        return None;
    }

    let pa = |x: usize, y: usize| a.get_pixel(x as u32, y as u32)[0] as f64;
    let pb = |x: usize, y: usize| b.get_pixel(x as u32, y as u32)[0] as f64;

    let sum_a = Integral::build(width, height, pa);
    let sum_b = Integral::build(width, height, pb);
    let sum_aa = Integral::build(width, height, |x, y| pa(x, y) * pa(x, y));
    let sum_bb = Integral::build(width, height, |x, y| pb(x, y) * pb(x, y));
    let sum_ab = Integral::build(width, height, |x, y| pa(x, y) * pb(x, y));

    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let rows = height - WINDOW + 1;
    let cols = width - WINDOW + 1;

    let total: f64 = (0..rows)
        .into_par_iter()
        .map(|y| {
            let mut row_total = 0.0;
            for x in 0..cols {
                let ux = sum_a.window(x, y) / n;
                let uy = sum_b.window(x, y) / n;
                let uxx = sum_aa.window(x, y) / n;
                let uyy = sum_bb.window(x, y) / n;
                let uxy = sum_ab.window(x, y) / n;

                let vx = cov_norm * (uxx - ux * ux);
                let vy = cov_norm * (uyy - uy * uy);
                let vxy = cov_norm * (uxy - ux * uy);

                let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                row_total += numerator / denominator;
            }
            row_total
        })
        .sum();

    Some(total / (rows * cols) as f64)
}

/// Compare `region` of `scene` with `reference`, resizing the reference to
/// the crop so a slightly misconfigured region still scores
pub fn similarity(scene: &RgbaImage, reference: &GrayImage, region: Region) -> Detection<f64> {
    let area = match crop(scene, region) {
        Ok(area) => to_gray(&area),
        Err(e) => return Detection::Failed(e.to_string()),
    };

    let resized = if reference.dimensions() == area.dimensions() {
        reference.clone()
    } else {
        resize(reference, area.width(), area.height(), FilterType::Triangle)
    };

    match ssim(&area, &resized) {
        Some(score) => Detection::Found(score),
        None => Detection::Failed(format!(
            "region {} is smaller than the {}x{} comparison window",
            region, WINDOW, WINDOW
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]))
    }

    #[test]
    fn test_identical_images_score_one() {
        let image = gradient(32, 24);
        let score = ssim(&image, &image).unwrap();
        assert!((score - 1.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_inverted_image_scores_low() {
        let image = gradient(32, 24);
        let mut inverted = image.clone();
        image::imageops::invert(&mut inverted);

        let score = ssim(&image, &inverted).unwrap();
        assert!(score < 0.0, "score was {score}");
    }

    #[test]
    fn test_noise_lowers_score() {
        let image = gradient(32, 32);
        let noisy = GrayImage::from_fn(32, 32, |x, y| {
            let base = image.get_pixel(x, y)[0] as i32;
            let delta = if (x + y) % 2 == 0 { 20 } else { -20 };
            Luma([(base + delta).clamp(0, 255) as u8])
        });

        let score = ssim(&image, &noisy).unwrap();
        assert!(score > 0.0 && score < 0.99, "score was {score}");
    }

    #[test]
    fn test_too_small_or_mismatched_is_rejected() {
        assert!(ssim(&gradient(6, 20), &gradient(6, 20)).is_none());
        assert!(ssim(&gradient(10, 10), &gradient(12, 10)).is_none());
    }

    #[test]
    fn test_similarity_resizes_reference_to_region() {
        let mut scene = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        for y in 20..60 {
            for x in 10..50 {
                let v = if (x / 5 + y / 5) % 2 == 0 { 230 } else { 30 };
                scene.put_pixel(x, y, Rgba([v, v, v, 255]));
            }
        }
        let region = Region::new(10, 20, 50, 60);
        let exact = to_gray(&image::imageops::crop_imm(&scene, 10, 20, 40, 40).to_image());
        let doubled = resize(&exact, 80, 80, FilterType::Nearest);

        let same = similarity(&scene, &exact, region).found().unwrap();
        assert!((same - 1.0).abs() < 1e-9);

        let scaled = similarity(&scene, &doubled, region).found().unwrap();
        assert!(scaled > 0.6, "score was {scaled}");
    }

    #[test]
    fn test_region_outside_frame_fails() {
        let scene = RgbaImage::new(20, 20);
        let reference = gradient(10, 10);
        assert!(matches!(
            similarity(&scene, &reference, Region::new(30, 30, 40, 40)),
            Detection::Failed(_)
        ));
    }
}
