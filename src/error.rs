//! Error types for the edgequake-ocr2pdf library.
//!
//! Failures fall into two groups that are handled differently:
//!
//! * [`ClientError`]: returned as `Err` when an operation cannot even start
//!   (not an image, upload already running, no extracted text yet) or when the
//!   network gave no response at all.
//!
//! * Reply failures: the service answered, but with `success: false` or a
//!   body that does not parse. These are **not** errors in the `Result`
//!   sense. They end the session in the `Failed` state with a message, see
//!   [`crate::upload::UploadSession`] and [`crate::pdf::PdfSession`].
//!
//! The split mirrors what the user sees: a rejected selection leaves the page
//! untouched, while a failed request always ends in a visible terminal state.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-ocr2pdf library.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The candidate file's MIME type is not in the `image/*` category.
    #[error("Please select an image file ('{name}' is {mime_type})")]
    NotAnImage { name: String, mime_type: String },

    /// The candidate image exceeds the configured size limit.
    #[error("'{name}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// The candidate path could not be read.
    #[error("Cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Precondition errors ───────────────────────────────────────────────
    /// Upload was triggered with nothing selected.
    #[error("No image selected")]
    NoFileSelected,

    /// PDF creation was triggered before any text was extracted.
    #[error("No text has been extracted yet.\nUpload an image first.")]
    NoExtractedText,

    /// Download was requested but no PDF has been created.
    #[error("No PDF has been created yet")]
    NoPdf,

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never produced a response (connect failure, timeout, …).
    #[error("Request to '{url}' failed: {reason}")]
    Network { url: String, reason: String },

    /// `/status` answered with something other than a known status payload.
    #[error("Unexpected status payload: {detail}")]
    StatusPayload { detail: String },

    /// The PDF download returned a non-success status.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Could not write the downloaded PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// True for selection failures: shown to the user, no other state change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClientError::NotAnImage { .. } | ClientError::FileTooLarge { .. } | ClientError::Io { .. }
        )
    }
}
