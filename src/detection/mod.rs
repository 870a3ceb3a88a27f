/// Detection policies
///
/// Compose the perception primitives with the configured regions, reference
/// images and thresholds into the questions the controller asks.
///
/// ## Architecture
///
/// ```text
/// Controller
///   ├── header_detected     (template match, header region, fixed 0.90)
///   ├── identify_target     (OCR region + catalog lookup)
///   ├── match_form          (SSIM per form photo, photo region, first match)
///   ├── find_action_marker  (template match, action scan region)
///   └── classify_form       (special / flee label sets)
/// ```
///
/// Failures from perception never escape: they are logged and read as
/// "not detected".
use image::RgbaImage;
use std::path::Path;

use crate::catalog::{Target, TargetCatalog};
use crate::config::{Region, ScreenPoint, Settings};
use crate::perception::{Detection, Perception};
use crate::runtime::BotLog;

/// Correlation the encounter header must reach
pub const HEADER_THRESHOLD: f32 = 0.90;

/// Result of reading the name plate
#[derive(Debug, Clone, PartialEq)]
pub enum Identification<'a> {
    /// OCR produced no text
    NoText,
    /// Text that names nothing in the catalog
    Unknown(String),
    /// Canonical catalog entry for the recognized name
    Known(&'a Target),
}

/// A form photo that cleared the similarity threshold
#[derive(Debug, Clone, PartialEq)]
pub struct FormMatch {
    pub label: String,
    pub score: f64,
}

/// What to do about a matched form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Capture,
    Flee,
    /// In neither list; treated as flee by the controller
    Unclassified,
}

/// Whether the encounter header is on screen
pub fn header_detected<P: Perception + ?Sized>(
    perception: &mut P,
    scene: &RgbaImage,
    settings: &Settings,
    log: &BotLog,
) -> bool {
    let Some(reference) = settings.header_image.as_deref() else {
        log.error("Items header detect error: no header image configured");
        return false;
    };

    match perception.match_template(
        scene,
        reference,
        HEADER_THRESHOLD,
        Some(settings.header_region),
    ) {
        Detection::Found(_) => true,
        Detection::NotFound => false,
        Detection::Failed(reason) => {
            log.error(format!("Items header detect error: {}", reason));
            false
        }
    }
}

/// Read the name plate and look it up in the catalog, ignoring case
pub fn identify_target<'c, P: Perception + ?Sized>(
    perception: &mut P,
    scene: &RgbaImage,
    settings: &Settings,
    catalog: &'c TargetCatalog,
    log: &BotLog,
) -> Identification<'c> {
    let text = match perception.recognize_text(scene, settings.ocr_region) {
        Detection::Found(text) => text,
        Detection::NotFound => String::new(),
        Detection::Failed(reason) => {
            log.error(format!("OCR failed: {}", reason));
            String::new()
        }
    };
    log.scan(format!("OCR Result: '{}'", text));

    if text.is_empty() {
        return Identification::NoText;
    }
    match catalog.find(&text) {
        Some(target) => Identification::Known(target),
        None => Identification::Unknown(text),
    }
}

/// Compare each of the target's form photos against the photo region.
///
/// Photos are tried in catalog order and the first one whose score reaches
/// the threshold wins, even if a later photo would score higher.
pub fn match_form<P: Perception + ?Sized>(
    perception: &mut P,
    scene: &RgbaImage,
    target: &Target,
    settings: &Settings,
    log: &BotLog,
) -> Option<FormMatch> {
    for form in &target.forms {
        let score = match perception.similarity(scene, &form.image, settings.photo_region) {
            Detection::Found(score) => score,
            Detection::NotFound => 0.0,
            Detection::Failed(reason) => {
                log.error(format!("Photo comparison failed: {}", reason));
                0.0
            }
        };
        log.scan(format!("  - Checking '{}', Score: {:.3}", form.label, score));

        if score >= settings.photo_match_threshold {
            return Some(FormMatch {
                label: form.label.clone(),
                score,
            });
        }
    }
    None
}

/// Locate a capture-sequence button inside `region`
pub fn find_action_marker<P: Perception + ?Sized>(
    perception: &mut P,
    scene: &RgbaImage,
    reference: &Path,
    threshold: f32,
    region: Region,
    log: &BotLog,
) -> Option<ScreenPoint> {
    match perception.match_template(scene, reference, threshold, Some(region)) {
        Detection::Found(found) => {
            let name = reference
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| reference.display().to_string());
            log.info(format!(
                "Image match for {} with score {:.3}",
                name, found.score
            ));
            Some(found.centre)
        }
        Detection::NotFound => None,
        Detection::Failed(reason) => {
            log.error(format!("Image detection failed: {}", reason));
            None
        }
    }
}

/// Classify a form label against the special and flee lists, ignoring case
pub fn classify_form(label: &str, settings: &Settings) -> FormAction {
    let label = label.trim().to_lowercase();
    let listed = |forms: &[String]| forms.iter().any(|f| f.trim().to_lowercase() == label);

    if listed(&settings.special_forms) {
        FormAction::Capture
    } else if listed(&settings.flee_forms) {
        FormAction::Flee
    } else {
        FormAction::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::perception::TemplateMatch;
    use crate::runtime::{LogConduit, LogTag};
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Perception with canned answers per reference path
    #[derive(Default)]
    struct CannedPerception {
        text: Option<String>,
        scores: HashMap<PathBuf, f64>,
        markers: HashMap<PathBuf, Detection<TemplateMatch>>,
        similarity_calls: Vec<PathBuf>,
    }

    impl Perception for CannedPerception {
        fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
            Ok(RgbaImage::new(1, 1))
        }

        fn match_template(
            &mut self,
            _scene: &RgbaImage,
            reference: &Path,
            threshold: f32,
            _region: Option<Region>,
        ) -> Detection<TemplateMatch> {
            match self.markers.get(reference) {
                Some(Detection::Found(m)) if m.score >= threshold => Detection::Found(*m),
                Some(Detection::Found(_)) | None => Detection::NotFound,
                Some(other) => other.clone(),
            }
        }

        fn recognize_text(&mut self, _scene: &RgbaImage, _region: Region) -> Detection<String> {
            match &self.text {
                Some(text) if !text.is_empty() => Detection::Found(text.clone()),
                _ => Detection::NotFound,
            }
        }

        fn similarity(
            &mut self,
            _scene: &RgbaImage,
            reference: &Path,
            _region: Region,
        ) -> Detection<f64> {
            self.similarity_calls.push(reference.to_path_buf());
            match self.scores.get(reference) {
                Some(score) => Detection::Found(*score),
                None => Detection::Failed("missing photo".to_string()),
            }
        }
    }

    fn catalog() -> TargetCatalog {
        let mut catalog = TargetCatalog::new();
        catalog.add_target("zymbat").unwrap();
        catalog.add_form("zymbat", "gamma", "gamma.png").unwrap();
        catalog.add_form("zymbat", "alpha", "alpha.png").unwrap();
        catalog
    }

    fn settings() -> Settings {
        Settings {
            header_image: Some(PathBuf::from("header.png")),
            ..Settings::default()
        }
    }

    #[test]
    fn test_identify_is_case_insensitive() {
        let catalog = catalog();
        let mut perception = CannedPerception {
            text: Some("Zymbat".to_string()),
            ..Default::default()
        };
        let scene = RgbaImage::new(1, 1);

        match identify_target(&mut perception, &scene, &settings(), &catalog, &BotLog::detached())
        {
            Identification::Known(target) => assert_eq!(target.name, "zymbat"),
            other => panic!("expected a catalog hit, got {:?}", other),
        }
    }

    #[test]
    fn test_identify_empty_and_unknown() {
        let catalog = catalog();
        let scene = RgbaImage::new(1, 1);
        let log = BotLog::detached();

        let mut blank = CannedPerception::default();
        assert_eq!(
            identify_target(&mut blank, &scene, &settings(), &catalog, &log),
            Identification::NoText
        );

        let mut other = CannedPerception {
            text: Some("Twilat".to_string()),
            ..Default::default()
        };
        assert_eq!(
            identify_target(&mut other, &scene, &settings(), &catalog, &log),
            Identification::Unknown("Twilat".to_string())
        );
    }

    #[test]
    fn test_match_form_takes_first_not_best() {
        let catalog = catalog();
        let target = catalog.find("zymbat").unwrap();
        let mut perception = CannedPerception::default();
        perception.scores.insert(PathBuf::from("gamma.png"), 0.86);
        perception.scores.insert(PathBuf::from("alpha.png"), 0.99);

        let found = match_form(
            &mut perception,
            &RgbaImage::new(1, 1),
            target,
            &settings(),
            &BotLog::detached(),
        )
        .unwrap();
        assert_eq!(found.label, "gamma");
        assert_eq!(perception.similarity_calls.len(), 1);
    }

    #[test]
    fn test_match_form_threshold_boundary() {
        let catalog = catalog();
        let target = catalog.find("zymbat").unwrap();
        let scene = RgbaImage::new(1, 1);
        let log = BotLog::detached();

        let mut below = CannedPerception::default();
        below.scores.insert(PathBuf::from("gamma.png"), 0.84);
        below.scores.insert(PathBuf::from("alpha.png"), 0.10);
        assert!(match_form(&mut below, &scene, target, &settings(), &log).is_none());

        let mut exact = CannedPerception::default();
        exact.scores.insert(PathBuf::from("gamma.png"), 0.85);
        assert_eq!(
            match_form(&mut exact, &scene, target, &settings(), &log)
                .unwrap()
                .label,
            "gamma"
        );
    }

    #[test]
    fn test_failed_photo_counts_as_zero_and_is_logged() {
        let catalog = catalog();
        let target = catalog.find("zymbat").unwrap();
        let conduit = LogConduit::new();
        let mut perception = CannedPerception::default();
        perception.scores.insert(PathBuf::from("alpha.png"), 0.9);

        let found = match_form(
            &mut perception,
            &RgbaImage::new(1, 1),
            target,
            &settings(),
            &conduit.logger(),
        )
        .unwrap();
        assert_eq!(found.label, "alpha");
        assert!(conduit
            .drain()
            .iter()
            .any(|l| l.tag == LogTag::Error && l.message.contains("missing photo")));
    }

    #[test]
    fn test_header_detection_is_stable_for_same_frame() {
        let mut perception = CannedPerception::default();
        perception.markers.insert(
            PathBuf::from("header.png"),
            Detection::Found(TemplateMatch {
                centre: ScreenPoint::new(10, 10),
                score: 0.95,
            }),
        );
        let scene = RgbaImage::new(1, 1);
        let log = BotLog::detached();

        let first = header_detected(&mut perception, &scene, &settings(), &log);
        let second = header_detected(&mut perception, &scene, &settings(), &log);
        assert!(first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_header_below_fixed_threshold_is_not_detected() {
        let mut perception = CannedPerception::default();
        perception.markers.insert(
            PathBuf::from("header.png"),
            Detection::Found(TemplateMatch {
                centre: ScreenPoint::new(10, 10),
                score: 0.89,
            }),
        );
        assert!(!header_detected(
            &mut perception,
            &RgbaImage::new(1, 1),
            &settings(),
            &BotLog::detached()
        ));
    }

    #[test]
    fn test_marker_failure_is_logged_not_raised() {
        let conduit = LogConduit::new();
        let mut perception = CannedPerception::default();
        perception.markers.insert(
            PathBuf::from("use.png"),
            Detection::Failed("corrupt png".to_string()),
        );

        let found = find_action_marker(
            &mut perception,
            &RgbaImage::new(1, 1),
            Path::new("use.png"),
            0.8,
            Region::new(0, 0, 10, 10),
            &conduit.logger(),
        );
        assert!(found.is_none());
        assert_eq!(conduit.drain()[0].tag, LogTag::Error);
    }

    #[test]
    fn test_classify_form() {
        let settings = settings();
        assert_eq!(classify_form("Gamma", &settings), FormAction::Capture);
        assert_eq!(classify_form("dull", &settings), FormAction::Flee);
        assert_eq!(classify_form("shiny", &settings), FormAction::Unclassified);
    }
}
