/// Perception primitives
///
/// Turn a captured frame into recognition results: template locations,
/// single-line text, and similarity scores. Every primitive reports through
/// [`Detection`] instead of raising, so a missing reference file or an
/// out-of-frame region degrades into "nothing seen this cycle".
pub mod similarity;
pub mod template;
pub mod text;

use image::{GrayImage, Luma, RgbaImage};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::capture::ScreenCapture;
use crate::config::Region;
use crate::error::{CaptureError, PerceptionError};

pub use similarity::ssim;
pub use template::TemplateMatch;
pub use text::TesseractReader;

/// Outcome of a single recognition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Detection<T> {
    /// The thing looked for is on screen
    Found(T),
    /// Looked, and it is not there
    NotFound,
    /// Could not look (bad reference image, empty crop, OCR failure)
    Failed(String),
}

impl<T> Detection<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Detection::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Detection::Found(value) => Some(value),
            Detection::NotFound | Detection::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Detection<U> {
        match self {
            Detection::Found(value) => Detection::Found(f(value)),
            Detection::NotFound => Detection::NotFound,
            Detection::Failed(reason) => Detection::Failed(reason),
        }
    }

    /// Failure reason, if the attempt could not be made
    pub fn failure(&self) -> Option<&str> {
        match self {
            Detection::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<Option<T>, E>> for Detection<T> {
    fn from(result: Result<Option<T>, E>) -> Self {
        match result {
            Ok(Some(value)) => Detection::Found(value),
            Ok(None) => Detection::NotFound,
            Err(e) => Detection::Failed(e.to_string()),
        }
    }
}

/// Everything the controller needs to see the screen.
///
/// Implemented by [`ScreenPerception`] for the live desktop and by fakes in tests.
pub trait Perception {
    /// Capture the full visible display
    fn capture(&mut self) -> Result<RgbaImage, CaptureError>;

    /// Best normalized cross-correlation match of `reference`, reported when
    /// its score reaches `threshold`
    fn match_template(
        &mut self,
        scene: &RgbaImage,
        reference: &Path,
        threshold: f32,
        region: Option<Region>,
    ) -> Detection<TemplateMatch>;

    /// Single line of text inside `region`, cleaned; empty text is `NotFound`
    fn recognize_text(&mut self, scene: &RgbaImage, region: Region) -> Detection<String>;

    /// Structural similarity between `region` and `reference` resized to it
    fn similarity(&mut self, scene: &RgbaImage, reference: &Path, region: Region)
        -> Detection<f64>;
}

/// Live perception: xcap capture, Tesseract OCR and cached reference images
pub struct ScreenPerception {
    capture: ScreenCapture,
    reader: TesseractReader,
    references: HashMap<PathBuf, GrayImage>,
}

impl ScreenPerception {
    pub fn new(tessdata: Option<&Path>) -> anyhow::Result<Self> {
        let capture = ScreenCapture::new()?;
        let reader = TesseractReader::new(tessdata)?;
        Ok(Self {
            capture,
            reader,
            references: HashMap::new(),
        })
    }

    /// Reference images are read once per run; settings and catalog do not
    /// change while the bot is running.
    fn reference(&mut self, path: &Path) -> Result<&GrayImage, PerceptionError> {
        match self.references.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(load_reference(path)?)),
        }
    }
}

impl Perception for ScreenPerception {
    fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        self.capture.capture()
    }

    fn match_template(
        &mut self,
        scene: &RgbaImage,
        reference: &Path,
        threshold: f32,
        region: Option<Region>,
    ) -> Detection<TemplateMatch> {
        match self.reference(reference) {
            Ok(template) => template::match_template(scene, template, threshold, region),
            Err(e) => Detection::Failed(e.to_string()),
        }
    }

    fn recognize_text(&mut self, scene: &RgbaImage, region: Region) -> Detection<String> {
        text::recognize_text(&mut self.reader, scene, region)
    }

    fn similarity(
        &mut self,
        scene: &RgbaImage,
        reference: &Path,
        region: Region,
    ) -> Detection<f64> {
        match self.reference(reference) {
            Ok(reference) => similarity::similarity(scene, reference, region),
            Err(e) => Detection::Failed(e.to_string()),
        }
    }
}

/// Load a reference image from disk as single-channel intensity
pub fn load_reference(path: &Path) -> Result<GrayImage, PerceptionError> {
    let image = image::open(path).map_err(|source| PerceptionError::ReferenceLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(to_gray(&image.to_rgba8()))
}

/// RGBA to grayscale with integer BT.601 weights
///
/// Alpha is ignored; screen captures are opaque.
pub fn to_gray(image: &RgbaImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let r = pixel[0] as u32;
        let g = pixel[1] as u32;
        let b = pixel[2] as u32;
        // 0.299, 0.587, 0.114 scaled by 256
        let luma = (77 * r + 150 * g + 29 * b) >> 8;
        gray.put_pixel(x, y, Luma([luma as u8]));
    }
    gray
}

/// Crop `scene` to `region`, clamped to the frame
pub(crate) fn crop(scene: &RgbaImage, region: Region) -> Result<RgbaImage, PerceptionError> {
    let (width, height) = scene.dimensions();
    let clamped = region
        .clamp_to(width, height)
        .ok_or_else(|| PerceptionError::EmptyCrop {
            region: region.to_string(),
            width,
            height,
        })?;
    Ok(image::imageops::crop_imm(
        scene,
        clamped.left,
        clamped.top,
        clamped.width(),
        clamped.height(),
    )
    .to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_to_gray_weights() {
        let mut image = RgbaImage::new(3, 1);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        image.put_pixel(2, 0, Rgba([0, 255, 0, 255]));

        let gray = to_gray(&image);
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);
        assert_eq!(gray.get_pixel(2, 0)[0], 149);
    }

    #[test]
    fn test_crop_clamps_and_rejects_outside() {
        let scene = RgbaImage::new(50, 40);

        let cropped = crop(&scene, Region::new(40, 30, 100, 100)).unwrap();
        assert_eq!(cropped.dimensions(), (10, 10));

        assert!(matches!(
            crop(&scene, Region::new(60, 0, 80, 10)),
            Err(PerceptionError::EmptyCrop { .. })
        ));
    }

    #[test]
    fn test_detection_conversions() {
        let found: Detection<u32> = Ok::<_, String>(Some(3)).into();
        assert_eq!(found, Detection::Found(3));

        let missing: Detection<u32> = Ok::<_, String>(None).into();
        assert!(!missing.is_found());
        assert_eq!(missing.found(), None);

        let failed: Detection<u32> = Err::<Option<u32>, _>("broken".to_string()).into();
        assert_eq!(failed.failure(), Some("broken"));
        assert_eq!(failed.map(|v| v * 2), Detection::Failed("broken".to_string()));
    }

    #[test]
    fn test_missing_reference_is_an_error() {
        let path = std::env::temp_dir().join("encounter-scout-no-such-reference.png");
        assert!(matches!(
            load_reference(&path),
            Err(PerceptionError::ReferenceLoad { .. })
        ));
    }
}
