//! Upload controller: send the selected image, track progress, read the verdict.
//!
//! ## Reply interpretation
//!
//! | Reply                                     | Outcome                         |
//! |-------------------------------------------|---------------------------------|
//! | 2xx, `{"success": true, "text": …}`       | Succeeded, text revealed        |
//! | any status, payload with `error`          | Failed with that message        |
//! | non-2xx or malformed body, no `error`     | Failed with the status text     |
//! | no response at all                        | Failed, generic retry message   |
//!
//! Whatever the outcome, the upload action comes back enabled and the
//! progress indicator is hidden, so the user can always try again. That
//! includes an upload whose future is dropped before the reply (a timeout or
//! a losing `select!` branch): the session settles as Failed on drop.

use crate::error::ClientError;
use crate::progress::{self, PercentTracker, TransferProgress};
use crate::selector::SelectedFile;
use crate::service::{ConversionService, HttpReply, UploadPayload};
use crate::session::SessionState;
use crate::ui::{Element, UiAdapter};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shown when the upload request never got a response.
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed. Please try again.";

/// Recorded on a session whose upload was dropped before the reply.
const UPLOAD_ABANDONED_MESSAGE: &str = "Upload was cancelled before the service replied.";

/// State of the current (or last) upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    pub state: SessionState,
    /// `None` until a computable progress event arrives; never decreases
    /// while in flight.
    pub progress_percent: Option<u8>,
    pub extracted_text: Option<String>,
    pub error_message: Option<String>,
    /// Name the service stored the upload under, when it reports one.
    pub server_filename: Option<String>,
}

/// What an `/upload` reply means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Extracted {
        text: String,
        filename: Option<String>,
    },
    Rejected {
        message: String,
    },
}

/// Interpret an `/upload` reply. See the module table.
pub fn interpret_reply(reply: &HttpReply) -> UploadOutcome {
    match serde_json::from_str::<UploadPayload>(&reply.body) {
        Ok(payload) if payload.success && reply.is_success() => UploadOutcome::Extracted {
            text: payload.text.unwrap_or_default(),
            filename: payload.filename,
        },
        Ok(UploadPayload {
            error: Some(message),
            ..
        }) => UploadOutcome::Rejected { message },
        Ok(_) | Err(_) => UploadOutcome::Rejected {
            message: reply.status_text.clone(),
        },
    }
}

/// Drives one upload at a time and owns the resulting session.
pub struct UploadController {
    service: Arc<dyn ConversionService>,
    session: UploadSession,
}

impl UploadController {
    pub fn new(service: Arc<dyn ConversionService>) -> Self {
        Self {
            service,
            session: UploadSession::default(),
        }
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    /// Upload `file` and return the terminal session.
    ///
    /// Every request outcome, including network failure, is reported through
    /// the session and `ui`, not as `Err`. `&mut self` keeps uploads from
    /// overlapping.
    pub async fn upload(
        &mut self,
        file: &SelectedFile,
        ui: &dyn UiAdapter,
    ) -> Result<&UploadSession, ClientError> {
        self.session = UploadSession {
            state: SessionState::InFlight,
            progress_percent: Some(0),
            ..Default::default()
        };
        ui.set_enabled(Element::UploadButton, false);
        ui.set_progress_width(0);
        ui.set_visible(Element::ProgressContainer, true);
        info!("Uploading {}", file.label());

        let (tx, mut rx) = progress::channel();
        let mut tracker = PercentTracker::default();
        let mut settle = SettleOnDrop {
            session: &mut self.session,
            ui,
        };
        let session = &mut *settle.session;

        let result = {
            let request = self.service.upload(file, tx);
            tokio::pin!(request);
            loop {
                tokio::select! {
                    biased;
                    Some(event) = rx.recv() => apply_progress(session, &mut tracker, event, ui),
                    result = &mut request => break result,
                }
            }
        };
        // Events queued before completion still belong to this session.
        while let Ok(event) = rx.try_recv() {
            apply_progress(session, &mut tracker, event, ui);
        }

        match result {
            Ok(reply) => match interpret_reply(&reply) {
                UploadOutcome::Extracted { text, filename } => {
                    info!("Extracted {} chars from {}", text.len(), file.name());
                    ui.set_text(Element::ExtractedText, &text);
                    ui.set_visible(Element::ResultCard, true);
                    ui.scroll_into_view(Element::ResultCard);
                    session.state = SessionState::Succeeded;
                    session.extracted_text = Some(text);
                    session.server_filename = filename;
                }
                UploadOutcome::Rejected { message } => {
                    warn!("Upload of {} rejected (HTTP {}): {}", file.name(), reply.status, message);
                    ui.notify(&format!("Error: {message}"));
                    session.state = SessionState::Failed;
                    session.error_message = Some(message);
                }
            },
            Err(e) => {
                warn!("Upload of {} failed: {}", file.name(), e);
                ui.notify(UPLOAD_FAILED_MESSAGE);
                session.state = SessionState::Failed;
                session.error_message = Some(UPLOAD_FAILED_MESSAGE.to_string());
            }
        }

        ui.set_visible(Element::ProgressContainer, false);
        ui.set_enabled(Element::UploadButton, true);
        drop(settle);
        Ok(&self.session)
    }
}

/// Settles a session left in flight when the upload future is dropped.
struct SettleOnDrop<'a> {
    session: &'a mut UploadSession,
    ui: &'a dyn UiAdapter,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.session.state != SessionState::InFlight {
            return;
        }
        warn!("Upload dropped before the service replied");
        self.session.state = SessionState::Failed;
        self.session.error_message = Some(UPLOAD_ABANDONED_MESSAGE.to_string());
        self.ui.set_visible(Element::ProgressContainer, false);
        self.ui.set_enabled(Element::UploadButton, true);
    }
}

fn apply_progress(
    session: &mut UploadSession,
    tracker: &mut PercentTracker,
    event: TransferProgress,
    ui: &dyn UiAdapter,
) {
    if let Some(pct) = tracker.observe(event) {
        debug!("Upload progress {}% ({} bytes)", pct, event.loaded);
        session.progress_percent = Some(pct);
        ui.set_progress_width(pct);
    }
}
