//! The conversion service as seen from the client.
//!
//! [`ConversionService`] is the only seam between the controllers and the
//! network. Implementations perform the request and hand back the raw
//! [`HttpReply`]; deciding what a reply *means* (success, application error,
//! transport error) is the controllers' job. That keeps the interpretation
//! rules testable without a server, and lets tests script replies.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /status      → {"status": "initializing" | "ready"}
//! POST /upload      → {"success": true, "text": …, "filename": …}
//!                   | {"success": false, "error": …}      (200 or 4xx)
//! POST /create-pdf  → {"success": true, "message": …, "pdf_url": …}
//!                   | {"error": …}                         (4xx / 5xx)
//! GET  <pdf_url>    → PDF bytes
//! ```

mod http;
pub mod scripted;

pub use http::HttpConversionService;
pub use scripted::ScriptedService;

use crate::error::ClientError;
use crate::progress::ProgressSender;
use crate::selector::SelectedFile;
use async_trait::async_trait;
use serde::Deserialize;

/// Status line and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Reason phrase for `status` (`"Bad Request"`, …), or `"HTTP <code>"`
    /// for codes without one.
    pub status_text: String,
    pub body: String,
}

impl HttpReply {
    /// Build a reply with the canonical reason phrase for `status`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text(status),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Canonical reason phrase for an HTTP status code.
pub fn status_text(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// The remote OCR / PDF service.
///
/// Every method returns `Err` only when no response was obtained at all.
/// Any response, whatever its status code, comes back as `Ok(HttpReply)`.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// `GET /status`.
    async fn status(&self) -> Result<HttpReply, ClientError>;

    /// `POST /upload` with `file` as the single multipart field `file`.
    ///
    /// Implementations push a [`crate::progress::TransferProgress`] into
    /// `progress` as body bytes are handed to the transport, in
    /// non-decreasing order, and drop the sender before returning.
    async fn upload(
        &self,
        file: &SelectedFile,
        progress: ProgressSender,
    ) -> Result<HttpReply, ClientError>;

    /// `POST /create-pdf` with a JSON content type and no body.
    async fn create_pdf(&self) -> Result<HttpReply, ClientError>;

    /// Fetch the generated PDF. `url` is the server-supplied `pdf_url`,
    /// usually a path relative to the service root.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ClientError>;
}

// ── Wire payloads ────────────────────────────────────────────────────────

/// Body of `GET /status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub status: String,
}

/// Body of `POST /upload`.
///
/// `success` defaults to false because the service's error replies carry
/// only `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadPayload {
    #[serde(default)]
    pub success: bool,
    pub text: Option<String>,
    pub error: Option<String>,
    pub filename: Option<String>,
}

/// Body of `POST /create-pdf`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePdfPayload {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub pdf_url: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_carries_reason_phrase() {
        let r = HttpReply::new(413, "");
        assert_eq!(r.status_text, "Payload Too Large");
        assert!(!r.is_success());
        assert!(HttpReply::new(204, "").is_success());
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(status_text(599), "HTTP 599");
    }

    #[test]
    fn error_only_upload_payload_is_not_success() {
        let p: UploadPayload = serde_json::from_str(r#"{"error": "No file part"}"#).unwrap();
        assert!(!p.success);
        assert_eq!(p.error.as_deref(), Some("No file part"));
        assert!(p.text.is_none());
    }

    #[test]
    fn pdf_payload_parses() {
        let p: CreatePdfPayload = serde_json::from_str(
            r#"{"success": true, "message": "Done", "pdf_url": "/download/a.pdf"}"#,
        )
        .unwrap();
        assert!(p.success);
        assert_eq!(p.pdf_url.as_deref(), Some("/download/a.pdf"));
    }
}
