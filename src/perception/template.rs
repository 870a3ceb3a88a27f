/// Grayscale template matching
///
/// Zero-mean normalized cross-correlation over the (optionally cropped)
/// scene. Only the single best location is reported, and only when its score
/// reaches the caller's threshold. A flat scene window or a flat template
/// carries no shape and scores 0.
use image::{GrayImage, ImageBuffer, Luma, RgbaImage};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{find_extremes, match_template as correlate, MatchTemplateMethod};
use rayon::prelude::*;

use super::{crop, to_gray, Detection};
use crate::config::{Region, ScreenPoint};
use crate::error::PerceptionError;

/// Per-pixel variance below which a scene window counts as flat
const MIN_WINDOW_VARIANCE: f64 = 0.5;

/// Best match of a template, in full-screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Centre of the matched area
    pub centre: ScreenPoint,
    pub score: f32,
}

/// Score and top-left corner of the best correlation in `scene`
///
/// score = (Σst − Σs·t̄) / sqrt((Σs² − (Σs)²/n) · Σ(t − t̄)²)
pub fn best_match(
    scene: &GrayImage,
    template: &GrayImage,
) -> Result<(f32, (u32, u32)), PerceptionError> {
    let (scene_w, scene_h) = scene.dimensions();
    let (template_w, template_h) = template.dimensions();
    if template_w == 0 || template_h == 0 || template_w > scene_w || template_h > scene_h {
        return Err(PerceptionError::TemplateTooLarge {
            template_w,
            template_h,
            scene_w,
            scene_h,
        });
    }

    let n = (template_w * template_h) as f64;
    let t_mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let t_var: f64 = template
        .pixels()
        .map(|p| (p[0] as f64 - t_mean).powi(2))
        .sum();

    let cross = correlate(scene, template, MatchTemplateMethod::CrossCorrelation);
    let (out_w, out_h) = cross.dimensions();
    let mut scores: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::new(out_w, out_h);

    if t_var > 0.0 {
        let sums = integral_image::<_, u64>(scene);
        let squares = integral_squared_image::<_, u64>(scene);

        scores
            .par_chunks_mut(out_w as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for (x, score) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    let (right, bottom) = (x + template_w - 1, y + template_h - 1);
                    let s_sum = sum_image_pixels(&sums, x, y, right, bottom)[0] as f64;
                    let s_sq = sum_image_pixels(&squares, x, y, right, bottom)[0] as f64;
                    let s_var = s_sq - s_sum * s_sum / n;
                    if s_var < MIN_WINDOW_VARIANCE * n {
                        continue;
                    }

                    let numerator = cross.get_pixel(x, y)[0] as f64 - s_sum * t_mean;
                    *score = (numerator / (s_var * t_var).sqrt()).clamp(-1.0, 1.0) as f32;
                }
            });
    }

    let extremes = find_extremes(&scores);
    Ok((extremes.max_value, extremes.max_value_location))
}

/// Whether a correlation score counts as a match; the threshold itself matches
pub fn accepts(score: f32, threshold: f32) -> bool {
    score >= threshold
}

/// Locate `template` in `scene`, restricted to `region` when given
///
/// # Returns
/// `Found` with the centre of the best match if its score is at least
/// `threshold`, `NotFound` otherwise, `Failed` if the search could not run.
pub fn match_template(
    scene: &RgbaImage,
    template: &GrayImage,
    threshold: f32,
    region: Option<Region>,
) -> Detection<TemplateMatch> {
    let (area, offset_x, offset_y) = match region {
        Some(region) => match crop(scene, region) {
            // crop() clamps, so the origin is the region's clamped corner
            Ok(cropped) => (cropped, region.left, region.top),
            Err(e) => return Detection::Failed(e.to_string()),
        },
        None => (scene.clone(), 0, 0),
    };

    let gray = to_gray(&area);
    let (score, (x, y)) = match best_match(&gray, template) {
        Ok(best) => best,
        Err(e) => return Detection::Failed(e.to_string()),
    };

    tracing::trace!("Template best score {:.3} at ({}, {})", score, x, y);

    if !score.is_finite() || !accepts(score, threshold) {
        return Detection::NotFound;
    }

    let centre = ScreenPoint::new(
        (offset_x + x + template.width() / 2) as i32,
        (offset_y + y + template.height() / 2) as i32,
    );
    Detection::Found(TemplateMatch { centre, score })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Pseudo-random texture so correlation has a single clear peak
    fn textured_scene(width: u32, height: u32) -> RgbaImage {
        let mut state: u32 = 0x2545_f491;
        RgbaImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let v = (state & 0xff) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn template_from(scene: &RgbaImage, x: u32, y: u32, w: u32, h: u32) -> GrayImage {
        to_gray(&image::imageops::crop_imm(scene, x, y, w, h).to_image())
    }

    #[test]
    fn test_finds_centre_of_embedded_template() {
        let scene = textured_scene(120, 80);
        let template = template_from(&scene, 40, 30, 20, 10);

        match match_template(&scene, &template, 0.99, None) {
            Detection::Found(m) => {
                assert_eq!(m.centre, ScreenPoint::new(50, 35));
                assert!(m.score > 0.99);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_region_offset_is_added_back() {
        let scene = textured_scene(120, 80);
        let template = template_from(&scene, 70, 50, 10, 10);

        let found = match_template(&scene, &template, 0.99, Some(Region::new(60, 40, 120, 80)))
            .found()
            .unwrap();
        assert_eq!(found.centre, ScreenPoint::new(75, 55));
    }

    #[test]
    fn test_score_equal_to_threshold_matches() {
        let scene = textured_scene(64, 64);
        let template = template_from(&scene, 10, 10, 8, 8);
        let (score, _) = best_match(&to_gray(&scene), &template).unwrap();

        assert!(match_template(&scene, &template, score, None).is_found());
        assert!(!match_template(&scene, &template, score + 1e-4, None).is_found());
        assert!(accepts(0.8, 0.8));
        assert!(!accepts(0.7999, 0.8));
    }

    #[test]
    fn test_oversized_template_fails_instead_of_panicking() {
        let scene = textured_scene(20, 20);
        let template = GrayImage::from_pixel(30, 5, Luma([128]));

        assert!(matches!(
            match_template(&scene, &template, 0.5, None),
            Detection::Failed(_)
        ));
    }

    #[test]
    fn test_region_outside_frame_fails() {
        let scene = textured_scene(20, 20);
        let template = GrayImage::from_pixel(4, 4, Luma([128]));

        assert!(matches!(
            match_template(&scene, &template, 0.5, Some(Region::new(50, 50, 60, 60))),
            Detection::Failed(_)
        ));
    }

    #[test]
    fn test_flat_frame_does_not_match_textured_template() {
        let scene = RgbaImage::from_pixel(200, 100, Rgba([140, 140, 140, 255]));
        let template = GrayImage::from_fn(60, 20, |x, _| match x % 3 {
            0 => Luma([90]),
            1 => Luma([140]),
            _ => Luma([200]),
        });

        let (score, _) = best_match(&to_gray(&scene), &template).unwrap();
        assert!(score.abs() < 1e-6, "flat frame scored {}", score);
        assert!(!match_template(&scene, &template, 0.90, None).is_found());
    }

    #[test]
    fn test_brightness_shift_still_matches() {
        let scene = textured_scene(96, 64);
        let template = template_from(&scene, 30, 20, 16, 12);
        let brighter = GrayImage::from_fn(16, 12, |x, y| {
            Luma([(template.get_pixel(x, y)[0] / 2).saturating_add(60)])
        });

        // Halved contrast plus an offset is still the same shape
        match match_template(&scene, &brighter, 0.95, None) {
            Detection::Found(m) => assert_eq!(m.centre, ScreenPoint::new(38, 26)),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_template_never_matches() {
        let scene = textured_scene(40, 40);
        let template = GrayImage::from_pixel(8, 8, Luma([128]));

        assert!(!match_template(&scene, &template, 0.5, None).is_found());
    }
}
