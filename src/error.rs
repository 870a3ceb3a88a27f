use std::path::PathBuf;

use thiserror::Error;

/// Library-level errors using thiserror for structured error handling.
///
/// These errors represent domain-specific failures that can occur while the
/// bot perceives the screen or acts on it. They provide context and can be
/// chained with anyhow in the binary.

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors")]
    MonitorsUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to capture screen")]
    CaptureFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No displays found")]
    NoDisplays,
}

#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("Failed to load reference image {path}")]
    ReferenceLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Region {region} does not intersect the {width}x{height} frame")]
    EmptyCrop {
        region: String,
        width: u32,
        height: u32,
    },

    #[error("Reference image {template_w}x{template_h} is larger than search area {scene_w}x{scene_h}")]
    TemplateTooLarge {
        template_w: u32,
        template_h: u32,
        scene_w: u32,
        scene_h: u32,
    },
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine")]
    InitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to perform OCR on image")]
    RecognitionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to preprocess image")]
    PreprocessFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine user config directory")]
    NoConfigDir,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to load target catalog from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save target catalog to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("Target not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ActuationError {
    #[error("Automation executable not configured")]
    ExecutableMissing,

    #[error("{0} script not configured")]
    ScriptMissing(&'static str),

    #[error("Failed to launch {program}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script {script} exited with {status}: {stderr}")]
    ScriptFailed {
        script: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to move pointer: {0}")]
    PointerFailed(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to encode screenshot")]
    EncodeFailed(#[source] image::ImageError),

    #[error("Webhook request to {url} failed")]
    RequestFailed {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Bot not running")]
    NotRunning,

    #[error("Bot already running")]
    AlreadyRunning,

    #[error("Bot is starting or stopping")]
    InTransition,

    #[error("Missing or invalid configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    #[error("Failed to start {0} thread")]
    ThreadSpawnFailed(&'static str, #[source] std::io::Error),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = RunError::NotRunning;
        assert_eq!(err.to_string(), "Bot not running");

        let err = RunError::MissingConfiguration(vec![
            "AHK Path".to_string(),
            "Items Header Image".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing or invalid configuration: AHK Path, Items Header Image"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::LoadFailed {
            path: "/test/settings.json".to_string(),
            source: Box::new(io_err),
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/settings.json"
        );
    }
}
