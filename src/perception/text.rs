/// Single-line text recognition
///
/// The name plate is light text on a dark plate. The crop is binarized with a
/// fixed cutoff and inverted so Tesseract sees dark text on white, then read
/// in single-line mode.
use image::{GrayImage, RgbaImage};
use leptess::{LepTess, Variable};
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::{crop, to_gray, Detection};
use crate::config::Region;
use crate::error::OcrError;

/// Pixels brighter than this become black text, everything else white
pub const BINARIZE_CUTOFF: u8 = 180;

/// Tesseract reads plate borders as underscores
const NOISE_CHAR: char = '_';

/// PSM 7 = treat the image as a single text line
const PAGE_SEG_SINGLE_LINE: &str = "7";

/// Tesseract wrapper configured for one line of text
pub struct TesseractReader {
    tess: LepTess,
    temp_path: PathBuf,
}

impl TesseractReader {
    /// Create a reader, using `tessdata` when given or the system data otherwise
    pub fn new(tessdata: Option<&Path>) -> Result<Self, OcrError> {
        tracing::info!("Initializing Tesseract OCR...");

        let datapath = tessdata.and_then(|p| p.to_str());
        if let Some(path) = datapath {
            tracing::info!("Initializing Tesseract with datapath: {}", path);
        }

        let mut tess = LepTess::new(datapath, "eng")
            .map_err(|e| OcrError::InitFailed(e.to_string().into()))?;
        tess.set_variable(Variable::TesseditPagesegMode, PAGE_SEG_SINGLE_LINE)
            .map_err(|e| OcrError::InitFailed(e.to_string().into()))?;

        tracing::info!("✓ Tesseract OCR initialized");
        tracing::info!("  Mode: PSM_SINGLE_LINE");

        Ok(Self {
            tess,
            temp_path: std::env::temp_dir()
                .join(format!("encounter-scout-ocr-{}.png", std::process::id())),
        })
    }

    /// Read one line from an already binarized image
    pub fn read_line(&mut self, binary: &GrayImage) -> Result<String, OcrError> {
        // leptess reads from a file path
        binary
            .save(&self.temp_path)
            .map_err(|e| OcrError::PreprocessFailed(Box::new(e)))?;

        let result = self
            .tess
            .set_image(&self.temp_path)
            .map_err(|e| OcrError::RecognitionFailed(e.to_string().into()))
            .and_then(|_| {
                self.tess
                    .get_utf8_text()
                    .map_err(|e| OcrError::RecognitionFailed(Box::new(e)))
            });

        let _ = std::fs::remove_file(&self.temp_path);
        result
    }
}

impl Drop for TesseractReader {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.temp_path);
    }
}

/// Fixed-cutoff inverted binarization: bright pixels become 0, the rest 255
pub fn binarize_inverted(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let mut binary = gray.clone();
    let row_size = (gray.width() as usize).max(1);
    binary.par_chunks_mut(row_size).for_each(|row| {
        for p in row.iter_mut() {
            *p = if *p > cutoff { 0 } else { 255 };
        }
    });
    binary
}

/// Strip the noise character, collapse runs of whitespace and trim
pub fn clean_text(raw: &str) -> String {
    static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();

    let without_noise: String = raw.chars().filter(|&c| c != NOISE_CHAR).collect();
    let trimmed = without_noise.trim();
    match WHITESPACE.get_or_init(|| Regex::new(r"\s+").ok()) {
        Some(whitespace) => whitespace.replace_all(trimmed, " ").into_owned(),
        None => trimmed.to_string(),
    }
}

/// Crop, binarize and read `region` of `scene`
///
/// # Returns
/// `Found` with the cleaned text, `NotFound` when nothing legible is there,
/// `Failed` when the crop or Tesseract fails.
pub fn recognize_text(
    reader: &mut TesseractReader,
    scene: &RgbaImage,
    region: Region,
) -> Detection<String> {
    let area = match crop(scene, region) {
        Ok(area) => area,
        Err(e) => return Detection::Failed(e.to_string()),
    };
    let binary = binarize_inverted(&to_gray(&area), BINARIZE_CUTOFF);

    match reader.read_line(&binary) {
        Ok(raw) => {
            let text = clean_text(&raw);
            if text.is_empty() {
                Detection::NotFound
            } else {
                Detection::Found(text)
            }
        }
        Err(e) => Detection::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_binarize_inverts_around_cutoff() {
        let mut gray = GrayImage::new(4, 1);
        gray.put_pixel(0, 0, Luma([255]));
        gray.put_pixel(1, 0, Luma([181]));
        gray.put_pixel(2, 0, Luma([180]));
        gray.put_pixel(3, 0, Luma([0]));

        let binary = binarize_inverted(&gray, BINARIZE_CUTOFF);
        let values: Vec<u8> = binary.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_clean_text_strips_noise() {
        assert_eq!(clean_text("  _Zymbat_ \n"), "Zymbat");
        assert_eq!(clean_text("Mega   Zymbat"), "Mega Zymbat");
        assert_eq!(clean_text("___"), "");
        assert_eq!(clean_text(""), "");
    }
}
