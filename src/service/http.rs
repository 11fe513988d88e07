//! [`ConversionService`] over HTTP with reqwest.
//!
//! ## Why stream a buffer we already hold?
//!
//! The image is read into memory up front (it is small), but it is handed to
//! reqwest as a chunked stream of known length. When the transport pulls a
//! chunk, everything before it has been taken, so that offset is reported;
//! the final 100 % comes when the transport finds the stream exhausted. It
//! is the closest a reqwest client gets to XHR upload progress without a
//! custom connector.

use super::{ConversionService, HttpReply};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::progress::{ProgressSender, TransferProgress};
use crate::selector::SelectedFile;
use async_trait::async_trait;
use futures::stream::{self, Stream};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, Url};
use std::sync::Arc;
use tracing::debug;

/// The production [`ConversionService`].
///
/// Holds a single `reqwest::Client` with a cookie store: the service keeps
/// the extracted text in its session cookie, and `/create-pdf` only works if
/// that cookie comes back.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: Client,
    config: ClientConfig,
}

impl HttpConversionService {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl ConversionService for HttpConversionService {
    async fn status(&self) -> Result<HttpReply, ClientError> {
        let url = self.config.endpoint("status")?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;
        read_reply(&url, response).await
    }

    async fn upload(
        &self,
        file: &SelectedFile,
        progress: ProgressSender,
    ) -> Result<HttpReply, ClientError> {
        let url = self.config.endpoint("upload")?;
        let data = file.source().read().await?;
        let total = data.len() as u64;

        let body = Body::wrap_stream(progress_chunks(
            data,
            self.config.upload_chunk_bytes,
            progress,
        ));
        let part = Part::stream_with_length(body, total)
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())
            .map_err(|_| ClientError::NotAnImage {
                name: file.name().to_string(),
                mime_type: file.mime_type().to_string(),
            })?;
        let form = Form::new().part("file", part);

        debug!("POST {} ({} bytes, {})", url, total, file.mime_type());
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;
        read_reply(&url, response).await
    }

    async fn create_pdf(&self) -> Result<HttpReply, ClientError> {
        let url = self.config.endpoint("create-pdf")?;
        debug!("POST {}", url);
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;
        read_reply(&url, response).await
    }

    async fn download(&self, pdf_url: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.config.endpoint(pdf_url)?;
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;

        if !response.status().is_success() {
            return Err(ClientError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }
}

/// Split `data` into body chunks, reporting the bytes already taken each
/// time the next chunk is pulled.
///
/// The sender moves into the stream and is dropped with it, which closes
/// the progress channel once reqwest is done with the body.
fn progress_chunks(
    data: Arc<[u8]>,
    chunk_bytes: usize,
    progress: ProgressSender,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    let total = data.len();
    let chunk_bytes = chunk_bytes.max(1);

    stream::unfold(0usize, move |taken| {
        if taken > 0 {
            // The receiver may already be gone if the caller stopped listening.
            let _ = progress.send(TransferProgress::new(taken as u64, Some(total as u64)));
        }
        let next = (taken < total).then(|| {
            let end = (taken + chunk_bytes).min(total);
            (Ok(data[taken..end].to_vec()), end)
        });
        futures::future::ready(next)
    })
}

async fn read_reply(url: &Url, response: Response) -> Result<HttpReply, ClientError> {
    let status = response.status();
    let status_text = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    let body = response
        .text()
        .await
        .map_err(|e| network_error(url, e))?;

    debug!("{} → {} ({} bytes)", url, status, body.len());
    Ok(HttpReply {
        status: status.as_u16(),
        status_text,
        body,
    })
}

fn network_error(url: &Url, e: reqwest::Error) -> ClientError {
    let reason = if e.is_timeout() {
        "timed out".to_string()
    } else {
        e.to_string()
    };
    ClientError::Network {
        url: url.to_string(),
        reason,
    }
}
