use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const APP_DIR_NAME: &str = "EncounterScout";
const SETTINGS_FILE: &str = "settings.json";

/// A single screen coordinate in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Rectangular screen region given by its top-left and bottom-right corners.
///
/// The bottom-right corner is exclusive, matching how crops are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Clamp the region to a frame of the given size.
    ///
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
        let clamped = Region {
            left: self.left.min(width),
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
        };
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }

    /// Check that the corners are ordered and the region has an area
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.right <= self.left || self.bottom <= self.top {
            return Err(ConfigError::Invalid(format!(
                "{name} region {self} must have its bottom-right corner below and right of its top-left corner"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] - [{}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Bot settings snapshot.
///
/// Owned by whoever edits the configuration; the bot only reads it. Any change
/// requires stopping the bot and starting it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the pointer goes before the run-away script fires
    pub run_away_point: ScreenPoint,
    /// Items button clicked to open the bag at the start of a capture
    pub open_items_point: ScreenPoint,
    pub capture_item_point: ScreenPoint,
    pub use_item_point: ScreenPoint,
    pub no_button_point: ScreenPoint,

    /// Click the centre of a matched marker instead of the configured point
    pub click_found_markers: bool,

    pub header_region: Region,
    pub ocr_region: Region,
    pub photo_region: Region,
    pub action_scan_region: Region,

    /// External automation executable (e.g. AutoHotkey)
    pub automation_executable: Option<PathBuf>,
    /// Script passed to the executable for every click during a capture
    pub capture_script: Option<PathBuf>,
    pub run_away_script: Option<PathBuf>,

    pub pause_hotkey: String,
    pub shutdown_hotkey: String,

    /// Minimum similarity score (0-1) for a form photo to count as matched
    pub photo_match_threshold: f64,
    /// Minimum correlation (0-1) for capture-sequence button markers
    pub marker_match_threshold: f32,

    pub webhook_urls: Vec<String>,

    /// Directory holding Tesseract's `tessdata`; system default when unset
    pub tessdata_path: Option<PathBuf>,

    pub header_image: Option<PathBuf>,
    pub capture_item_image: Option<PathBuf>,
    pub use_item_image: Option<PathBuf>,
    pub no_button_image: Option<PathBuf>,

    /// Form labels that trigger a capture attempt
    pub special_forms: Vec<String>,
    /// Form labels that trigger an explicit run away
    pub flee_forms: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let (screen_width, screen_height) = primary_display_size();
        Self {
            run_away_point: ScreenPoint::new(100, 100),
            open_items_point: ScreenPoint::new(200, 200),
            capture_item_point: ScreenPoint::new(300, 300),
            use_item_point: ScreenPoint::new(400, 400),
            no_button_point: ScreenPoint::new(500, 500),
            click_found_markers: true,
            header_region: Region::new(0, 0, 800, 600),
            ocr_region: Region::new(10, 10, 110, 40),
            photo_region: Region::new(10, 45, 110, 110),
            action_scan_region: Region::new(0, 0, screen_width, screen_height),
            automation_executable: None,
            capture_script: None,
            run_away_script: None,
            pause_hotkey: "F9".to_string(),
            shutdown_hotkey: "F12".to_string(),
            photo_match_threshold: 0.85,
            marker_match_threshold: 0.8,
            webhook_urls: Vec::new(),
            tessdata_path: None,
            header_image: None,
            capture_item_image: None,
            use_item_image: None,
            no_button_image: None,
            special_forms: vec!["gamma".to_string(), "alpha".to_string()],
            flee_forms: vec!["dull".to_string(), "frail".to_string()],
        }
    }
}

fn primary_display_size() -> (u32, u32) {
    display_info::DisplayInfo::all()
        .ok()
        .and_then(|infos| {
            let display = infos
                .iter()
                .find(|d| d.is_primary)
                .or_else(|| infos.first());
            display.map(|d| ((d.width as u32).max(1), (d.height as u32).max(1)))
        })
        .unwrap_or((1920, 1080))
}

impl Settings {
    /// Load settings from the platform-specific config directory.
    /// Creates a default file if none exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::settings_path()?;
        Self::load_from(&path)
    }

    /// Load settings from an explicit path, writing defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save_to(path)?;
            tracing::info!("✓ Created default settings at: {}", path.display());
            return Ok(settings);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        tracing::info!("✓ Loaded settings from: {}", path.display());
        Ok(settings)
    }

    /// Save settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let wrap = |e: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| wrap(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| wrap(Box::new(e)))?;
        fs::write(path, json).map_err(|e| wrap(Box::new(e)))?;
        Ok(())
    }

    /// Application data directory (settings, catalog and logs live here)
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn settings_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join(SETTINGS_FILE))
    }

    /// Check regions and thresholds for values the bot cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.header_region.validate("Header")?;
        self.ocr_region.validate("OCR")?;
        self.photo_region.validate("Photo")?;
        self.action_scan_region.validate("Action scan")?;

        if !(0.0..=1.0).contains(&self.photo_match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "photo match threshold {} must be between 0 and 1",
                self.photo_match_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.marker_match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "marker match threshold {} must be between 0 and 1",
                self.marker_match_threshold
            )));
        }
        Ok(())
    }

    /// Human-readable names of required files that are unset or missing on disk
    pub fn missing_requirements(&self) -> Vec<String> {
        let required: [(&str, &Option<PathBuf>); 7] = [
            ("Automation executable", &self.automation_executable),
            ("Capture script", &self.capture_script),
            ("Run away script", &self.run_away_script),
            ("Items header image", &self.header_image),
            ("Capture item image", &self.capture_item_image),
            ("Use button image", &self.use_item_image),
            ("No button image", &self.no_button_image),
        ];

        let mut missing: Vec<String> = required
            .iter()
            .filter(|(_, path)| !path.as_deref().is_some_and(Path::exists))
            .map(|(name, _)| name.to_string())
            .collect();

        if let Some(tessdata) = &self.tessdata_path {
            if !tessdata.exists() {
                missing.push("Tesseract data path".to_string());
            }
        }

        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.photo_match_threshold, 0.85);
        assert_eq!(settings.pause_hotkey, "F9");
        assert_eq!(settings.shutdown_hotkey, "F12");
        assert_eq!(settings.ocr_region, Region::new(10, 10, 110, 40));
        assert_eq!(settings.special_forms, vec!["gamma", "alpha"]);
        assert_eq!(settings.flee_forms, vec!["dull", "frail"]);
        assert!(settings.webhook_urls.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let json = r#"{ "photo_match_threshold": 0.9, "flee_forms": ["weak"] }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.photo_match_threshold, 0.9);
        assert_eq!(settings.flee_forms, vec!["weak"]);
        assert_eq!(settings.pause_hotkey, "F9");
        assert_eq!(settings.header_region, Region::new(0, 0, 800, 600));
    }

    #[test]
    fn test_region_geometry() {
        let region = Region::new(10, 20, 110, 70);
        assert_eq!(region.width(), 100);
        assert_eq!(region.height(), 50);
        assert!(!region.is_empty());

        assert_eq!(
            region.clamp_to(60, 40),
            Some(Region::new(10, 20, 60, 40))
        );
        assert_eq!(region.clamp_to(5, 5), None);
    }

    #[test]
    fn test_inverted_region_is_invalid() {
        let region = Region::new(100, 100, 50, 150);
        assert!(region.validate("OCR").is_err());
        assert!(Region::new(0, 0, 10, 0).validate("OCR").is_err());
    }

    #[test]
    fn test_threshold_out_of_range_is_invalid() {
        let settings = Settings {
            photo_match_threshold: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_requirements_lists_unset_paths() {
        let settings = Settings::default();
        let missing = settings.missing_requirements();

        assert_eq!(missing.len(), 7);
        assert!(missing.contains(&"Automation executable".to_string()));
        assert!(missing.contains(&"No button image".to_string()));
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = std::env::temp_dir().join(format!("encounter-scout-cfg-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);

        let created = Settings::load_from(&path).unwrap();
        assert!(path.exists());

        let mut edited = created.clone();
        edited.webhook_urls.push("https://example.invalid/hook".to_string());
        edited.save_to(&path).unwrap();

        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded, edited);

        let _ = fs::remove_dir_all(&dir);
    }
}
