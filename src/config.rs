//! Configuration for talking to the conversion service.
//!
//! Every knob lives in [`ClientConfig`], built via its [`ClientConfigBuilder`].
//! One struct is easy to clone into the poller task, log at start-up, and
//! compare between runs.

use crate::error::ClientError;
use reqwest::Url;
use std::time::Duration;

/// Default service address: the Flask development server's default port.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Configuration for a conversion client.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ocr2pdf::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://localhost:8080")
///     .poll_interval_ms(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_interval().as_millis(), 500);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root; endpoint paths (`/status`, `/upload`, …) are joined onto it.
    pub base_url: Url,

    /// Delay between readiness polls, measured from the previous response. Default: 2000.
    pub poll_interval_ms: u64,

    /// Keep polling after a failed `/status` request. Default: false.
    ///
    /// Off by default: a backend that is down stops getting polled and the
    /// status label stays at "initializing".
    pub auto_resume_polling: bool,

    /// Refuse `create_pdf` until an upload has succeeded. Default: true.
    ///
    /// With gating off the request is always sent and the service decides
    /// (it answers `{"error": "No text has been extracted yet"}`).
    pub gate_pdf_on_upload: bool,

    /// Per-request timeout in seconds. Default: None (transport default).
    pub request_timeout_secs: Option<u64>,

    /// Reject images larger than this many bytes at selection time. Default: None.
    pub max_file_bytes: Option<u64>,

    /// Size of the chunks the upload body is streamed in. Default: 64 KiB.
    ///
    /// Progress is reported as each chunk is pulled, counting the chunks
    /// already taken, so this is the progress granularity. An image no
    /// larger than one chunk reports 100 % only once the whole body is sent.
    pub upload_chunk_bytes: usize,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            poll_interval_ms: 2000,
            auto_resume_polling: false,
            gate_pdf_on_upload: true,
            request_timeout_secs: None,
            max_file_bytes: None,
            upload_chunk_bytes: 64 * 1024,
            user_agent: concat!("edgequake-ocr2pdf/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
            base_url: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve an endpoint path or a server-supplied link against `base_url`.
    ///
    /// Absolute URLs (`https://cdn/…`) pass through unchanged, so a
    /// `pdf_url` pointing elsewhere still works.
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::InvalidConfig(format!("cannot resolve '{path}': {e}")))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    base_url: Option<String>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms.max(1);
        self
    }

    pub fn auto_resume_polling(mut self, v: bool) -> Self {
        self.config.auto_resume_polling = v;
        self
    }

    pub fn gate_pdf_on_upload(mut self, v: bool) -> Self {
        self.config.gate_pdf_on_upload = v;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = Some(bytes);
        self
    }

    pub fn upload_chunk_bytes(mut self, n: usize) -> Self {
        self.config.upload_chunk_bytes = n.max(1);
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ClientConfig, ClientError> {
        if let Some(raw) = self.base_url.take() {
            self.config.base_url = parse_base_url(&raw)?;
        }
        if self.config.request_timeout_secs == Some(0) {
            return Err(ClientError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Parse and normalise the base URL.
///
/// A trailing slash is appended when missing so that `Url::join` keeps any
/// path prefix (`http://host/ocr` + `status` → `http://host/ocr/status`).
fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| ClientError::InvalidConfig(format!("base URL '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidConfig(format!(
            "base URL '{raw}' must be http or https, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_contract() {
        let c = ClientConfig::default();
        assert_eq!(c.poll_interval_ms, 2000);
        assert!(!c.auto_resume_polling);
        assert!(c.gate_pdf_on_upload);
        assert_eq!(c.base_url.as_str(), "http://127.0.0.1:5000/");
    }

    #[test]
    fn base_url_prefix_is_kept() {
        let c = ClientConfig::builder()
            .base_url("http://example.com/ocr")
            .build()
            .unwrap();
        assert_eq!(
            c.endpoint("status").unwrap().as_str(),
            "http://example.com/ocr/status"
        );
    }

    #[test]
    fn absolute_links_resolve_against_host() {
        let c = ClientConfig::default();
        assert_eq!(
            c.endpoint("/download/out.pdf").unwrap().as_str(),
            "http://127.0.0.1:5000/download/out.pdf"
        );
        assert_eq!(
            c.endpoint("https://cdn.example.com/x.pdf").unwrap().as_str(),
            "https://cdn.example.com/x.pdf"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(ClientConfig::builder()
            .request_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn clamps_degenerate_values() {
        let c = ClientConfig::builder()
            .poll_interval_ms(0)
            .upload_chunk_bytes(0)
            .build()
            .unwrap();
        assert_eq!(c.poll_interval_ms, 1);
        assert_eq!(c.upload_chunk_bytes, 1);
    }
}
