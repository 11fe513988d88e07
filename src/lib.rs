//! # edgequake-ocr2pdf
//!
//! Client-side orchestration for an image → text → PDF conversion service.
//!
//! ## Why this crate?
//!
//! The conversion service does the hard parts (OCR, PDF rendering) but a
//! front-end still has to get a lot right around it: accept only images,
//! show honest upload progress, wait for the OCR model to finish loading,
//! tell a rejected image apart from a dead network, and keep every button
//! in a state that makes sense. This crate does that once, behind a
//! [`UiAdapter`] trait, so a terminal, a desktop shell or a test harness can
//! drive the same workflow.
//!
//! ## Flow Overview
//!
//! ```text
//! candidate files
//!  │
//!  ├─ 1. Select   first candidate, image/* only          (FileSelector)
//!  ├─ 2. Upload   multipart POST /upload, progress events (UploadController)
//!  ├─ 3. Text     extracted text revealed on success
//!  ├─ 4. PDF      POST /create-pdf → pdf_url              (PdfCreator)
//!  └─ 5. Save     GET pdf_url → file                      (download_pdf)
//!
//! alongside: GET /status every 2 s until "ready"          (StatusPoller)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edgequake_ocr2pdf::{CandidateFile, ClientConfig, RecordingUi, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://127.0.0.1:5000")
//!         .build()?;
//!     let mut flow = Workflow::connect(config, Arc::new(RecordingUi::new()))?;
//!
//!     flow.select_files([CandidateFile::from_path("scan.png")?])?;
//!     let upload = flow.upload().await?;
//!     println!("{}", upload.extracted_text.as_deref().unwrap_or(""));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod pdf;
pub mod poller;
pub mod progress;
pub mod selector;
pub mod service;
pub mod session;
pub mod ui;
pub mod upload;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use error::ClientError;
pub use format::format_size;
pub use pdf::{PdfCreator, PdfSession, PDF_FAILED_MESSAGE};
pub use poller::{PollOutcome, PollerHandle, ServicePhase, StatusPoller};
pub use progress::TransferProgress;
pub use selector::{CandidateFile, FileSelector, FileSource, SelectedFile};
pub use service::{ConversionService, HttpConversionService, HttpReply, ScriptedService};
pub use session::SessionState;
pub use ui::{Element, RecordingUi, UiAdapter, UiState};
pub use upload::{UploadController, UploadSession, UPLOAD_FAILED_MESSAGE};
pub use workflow::Workflow;
