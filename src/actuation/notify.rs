/// Webhook notifications with an attached screenshot
///
/// Each configured endpoint gets a `multipart/form-data` POST with a `content`
/// text field and the frame as `screenshot.png`. Endpoints are independent: a
/// failure is logged and the rest still receive the message.
use image::{ImageFormat, RgbaImage};
use rand::Rng;
use std::io::Cursor;
use std::time::Duration;

use crate::error::NotifyError;
use crate::runtime::BotLog;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const ATTACHMENT_NAME: &str = "screenshot.png";

pub struct WebhookNotifier {
    urls: Vec<String>,
    log: BotLog,
}

impl WebhookNotifier {
    /// Blank entries are ignored
    pub fn new(urls: &[String], log: BotLog) -> Self {
        Self {
            urls: urls
                .iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
            log,
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.urls.len()
    }

    /// Post to every endpoint; returns how many accepted the message
    pub fn send(&self, message: &str, frame: &RgbaImage) -> usize {
        if self.urls.is_empty() {
            return 0;
        }

        let png = match encode_png(frame) {
            Ok(png) => png,
            Err(e) => {
                self.log.error(format!("Webhook screenshot encoding failed: {}", e));
                return 0;
            }
        };

        let boundary = format!("----encounter-scout-{:016x}", rand::thread_rng().gen::<u64>());
        let body = multipart_body(&boundary, message, &png);

        let mut delivered = 0;
        for url in &self.urls {
            match post(url, &boundary, &body) {
                Ok(()) => delivered += 1,
                Err(e) => self.log.error(format!("Webhook failed to {}: {}", url, error_chain(&e))),
            }
        }
        tracing::debug!("Webhook delivered to {}/{} endpoints", delivered, self.urls.len());
        delivered
    }
}

fn post(url: &str, boundary: &str, body: &[u8]) -> Result<(), NotifyError> {
    ureq::post(url)
        .set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        )
        .timeout(REQUEST_TIMEOUT)
        .send_bytes(body)
        .map(|_| ())
        .map_err(|e| NotifyError::RequestFailed {
            url: url.to_string(),
            source: Box::new(e),
        })
}

fn error_chain(e: &NotifyError) -> String {
    match std::error::Error::source(e) {
        Some(source) => format!("{}: {}", e, source),
        None => e.to_string(),
    }
}

/// Encode a frame as PNG bytes
pub fn encode_png(frame: &RgbaImage) -> Result<Vec<u8>, NotifyError> {
    let mut buffer = Cursor::new(Vec::new());
    frame
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(NotifyError::EncodeFailed)?;
    Ok(buffer.into_inner())
}

/// Two-part form body: the message text and the PNG attachment
pub fn multipart_body(boundary: &str, message: &str, png: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(png.len() + message.len() + 256);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"content\"\r\n\r\n");
    body.extend_from_slice(message.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            ATTACHMENT_NAME
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(png);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LogConduit;
    use crate::runtime::LogTag;

    #[test]
    fn test_multipart_layout() {
        let body = multipart_body("XYZ", "Found 'Zymbat'", b"\x89PNG");
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\nFound 'Zymbat'\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"screenshot.png\"\r\nContent-Type: image/png\r\n\r\n"));
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
    }

    #[test]
    fn test_encode_png_signature() {
        let frame = RgbaImage::new(4, 4);
        let png = encode_png(&frame).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_blank_urls_are_skipped() {
        let notifier = WebhookNotifier::new(
            &["".to_string(), "  ".to_string()],
            BotLog::detached(),
        );
        assert_eq!(notifier.endpoint_count(), 0);
        assert_eq!(notifier.send("hello", &RgbaImage::new(2, 2)), 0);
    }

    #[test]
    fn test_unreachable_endpoint_is_logged_not_raised() {
        let conduit = LogConduit::new();
        // Port 9 on loopback: connection refused without leaving the machine
        let notifier = WebhookNotifier::new(
            &["http://127.0.0.1:9/hook".to_string()],
            conduit.logger(),
        );

        assert_eq!(notifier.send("hello", &RgbaImage::new(2, 2)), 0);
        let lines = conduit.drain();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].tag, LogTag::Error);
        assert!(lines[0].message.starts_with("Webhook failed to http://127.0.0.1:9/hook"));
    }
}
