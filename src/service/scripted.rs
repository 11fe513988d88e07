//! A [`ConversionService`] that plays back canned replies.
//!
//! Used by this crate's tests and handy for downstream front-ends that want
//! to exercise their [`crate::ui::UiAdapter`] without a server. Every request
//! is logged with a `tokio::time::Instant`, so tests running on tokio's paused
//! clock can check request spacing.

use super::{ConversionService, HttpReply};
use crate::error::ClientError;
use crate::progress::{ProgressSender, TransferProgress};
use crate::selector::SelectedFile;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Which endpoint a logged request hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Status,
    Upload,
    CreatePdf,
    Download,
}

/// How a scripted request ends.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Reply(HttpReply),
    /// The request never got a response.
    Unreachable(String),
    /// The request never completes; for cancellation tests.
    Stall,
}

/// A scripted `/upload` exchange: progress events, then the reply.
#[derive(Debug, Clone)]
pub struct ScriptedUpload {
    pub progress: Vec<TransferProgress>,
    pub reply: ScriptedReply,
}

/// Canned-reply service. Each endpoint pops its next scripted answer; an
/// exhausted script behaves like an unreachable server.
#[derive(Debug, Default)]
pub struct ScriptedService {
    status: Mutex<VecDeque<ScriptedReply>>,
    uploads: Mutex<VecDeque<ScriptedUpload>>,
    create_pdf: Mutex<VecDeque<ScriptedReply>>,
    downloads: Mutex<HashMap<String, Vec<u8>>>,
    log: Mutex<Vec<(Endpoint, Instant)>>,
    uploaded: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `/status` reply with body `{"status": "<status>"}`.
    pub fn status(self, status: &str) -> Self {
        let body = serde_json::json!({ "status": status }).to_string();
        self.status_reply(HttpReply::new(200, body))
    }

    pub fn status_reply(self, reply: HttpReply) -> Self {
        lock(&self.status).push_back(ScriptedReply::Reply(reply));
        self
    }

    pub fn status_error(self, reason: &str) -> Self {
        lock(&self.status).push_back(ScriptedReply::Unreachable(reason.to_string()));
        self
    }

    pub fn upload(self, progress: Vec<TransferProgress>, reply: HttpReply) -> Self {
        lock(&self.uploads).push_back(ScriptedUpload {
            progress,
            reply: ScriptedReply::Reply(reply),
        });
        self
    }

    pub fn upload_error(self, progress: Vec<TransferProgress>, reason: &str) -> Self {
        lock(&self.uploads).push_back(ScriptedUpload {
            progress,
            reply: ScriptedReply::Unreachable(reason.to_string()),
        });
        self
    }

    /// Queue an upload that sends `progress` and then never completes.
    pub fn upload_stall(self, progress: Vec<TransferProgress>) -> Self {
        lock(&self.uploads).push_back(ScriptedUpload {
            progress,
            reply: ScriptedReply::Stall,
        });
        self
    }

    pub fn pdf_reply(self, reply: HttpReply) -> Self {
        lock(&self.create_pdf).push_back(ScriptedReply::Reply(reply));
        self
    }

    pub fn pdf_error(self, reason: &str) -> Self {
        lock(&self.create_pdf).push_back(ScriptedReply::Unreachable(reason.to_string()));
        self
    }

    /// Queue a `/create-pdf` request that never completes.
    pub fn pdf_stall(self) -> Self {
        lock(&self.create_pdf).push_back(ScriptedReply::Stall);
        self
    }

    pub fn download(self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        lock(&self.downloads).insert(url.to_string(), bytes.into());
        self
    }

    /// Times at which `endpoint` was hit, in order.
    pub fn requests(&self, endpoint: Endpoint) -> Vec<Instant> {
        lock(&self.log)
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn request_count(&self, endpoint: Endpoint) -> usize {
        self.requests(endpoint).len()
    }

    /// Names of the files passed to `upload`, in order.
    pub fn uploaded_names(&self) -> Vec<String> {
        lock(&self.uploaded).clone()
    }

    fn hit(&self, endpoint: Endpoint) {
        lock(&self.log).push((endpoint, Instant::now()));
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unreachable_server(endpoint: &str, reason: String) -> ClientError {
    ClientError::Network {
        url: format!("scripted://{endpoint}"),
        reason,
    }
}

async fn play(endpoint: &str, next: Option<ScriptedReply>) -> Result<HttpReply, ClientError> {
    match next {
        Some(ScriptedReply::Reply(reply)) => Ok(reply),
        Some(ScriptedReply::Unreachable(reason)) => Err(unreachable_server(endpoint, reason)),
        Some(ScriptedReply::Stall) => futures::future::pending().await,
        None => Err(unreachable_server(endpoint, "script exhausted".to_string())),
    }
}

#[async_trait]
impl ConversionService for ScriptedService {
    async fn status(&self) -> Result<HttpReply, ClientError> {
        self.hit(Endpoint::Status);
        let next = lock(&self.status).pop_front();
        play("status", next).await
    }

    async fn upload(
        &self,
        file: &SelectedFile,
        progress: ProgressSender,
    ) -> Result<HttpReply, ClientError> {
        self.hit(Endpoint::Upload);
        lock(&self.uploaded).push(file.name().to_string());
        let next = lock(&self.uploads).pop_front();
        let Some(script) = next else {
            return play("upload", None).await;
        };

        for event in script.progress {
            let _ = progress.send(event);
            // Let the controller observe events while the request is pending.
            tokio::task::yield_now().await;
        }
        play("upload", Some(script.reply)).await
    }

    async fn create_pdf(&self) -> Result<HttpReply, ClientError> {
        self.hit(Endpoint::CreatePdf);
        let next = lock(&self.create_pdf).pop_front();
        play("create-pdf", next).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        self.hit(Endpoint::Download);
        lock(&self.downloads)
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}
