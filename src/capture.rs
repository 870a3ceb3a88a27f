use image::RgbaImage;
use xcap::Monitor;

use crate::error::CaptureError;

/// Full-screen capture of the primary display.
///
/// # Platform Notes
/// - macOS: requires Screen Recording permission
///   (System Settings > Privacy & Security > Screen Recording)
/// - Windows: no special permissions required
/// - Linux: X11 or a Wayland compositor with screencast portal support
///
/// The monitor handle is looked up once and reused. If the display layout
/// changes while running, the next failed capture re-resolves it.
pub struct ScreenCapture {
    monitor: Option<Monitor>,
}

impl ScreenCapture {
    pub fn new() -> Result<Self, CaptureError> {
        let monitor = Self::primary_monitor()?;
        tracing::info!(
            "✓ Screen capturer initialized ({}x{})",
            monitor.width().unwrap_or(0),
            monitor.height().unwrap_or(0)
        );
        Ok(Self {
            monitor: Some(monitor),
        })
    }

    fn primary_monitor() -> Result<Monitor, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::MonitorsUnavailable(Box::new(e)))?;

        let mut fallback = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                return Ok(monitor);
            }
            if fallback.is_none() {
                fallback = Some(monitor);
            }
        }
        fallback.ok_or(CaptureError::NoDisplays)
    }

    /// Capture the full visible display as an RGBA frame
    pub fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        let monitor = match self.monitor.take() {
            Some(monitor) => monitor,
            None => Self::primary_monitor()?,
        };

        match monitor.capture_image() {
            Ok(image) => {
                self.monitor = Some(monitor);
                Ok(image)
            }
            // Drop the handle so the next call looks the display up again
            Err(e) => Err(CaptureError::CaptureFailed(Box::new(e))),
        }
    }
}
