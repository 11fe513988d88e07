//! PDF creation from the text the service already extracted.
//!
//! The service keeps the extracted text server-side (in the session cookie),
//! so `/create-pdf` carries no body. The reply names a URL the PDF can be
//! fetched from; [`PdfCreator::download_pdf`] fetches it and writes it to
//! disk.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::service::{ConversionService, CreatePdfPayload, HttpReply};
use crate::session::SessionState;
use crate::ui::{Element, UiAdapter, CREATE_PDF_LABEL, CREATING_PDF_LABEL};
use crate::upload::UploadSession;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shown when the PDF request got no usable reply.
pub const PDF_FAILED_MESSAGE: &str = "Error creating PDF. Please try again.";

/// Recorded on a session whose request was dropped before the reply.
const PDF_ABANDONED_MESSAGE: &str = "PDF request was cancelled before the service replied.";

/// State of the current (or last) PDF request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfSession {
    pub state: SessionState,
    /// Server confirmation shown above the download link.
    pub message: Option<String>,
    /// Server-supplied `pdf_url`, usually relative to the service root.
    pub download_url: Option<String>,
    pub error_message: Option<String>,
}

/// What a `/create-pdf` reply means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfOutcome {
    Created { message: String, pdf_url: String },
    /// The service explained why it refused.
    Rejected { error: String },
    /// No usable payload: wrong status, bad JSON or missing fields.
    Unusable,
}

/// Interpret a `/create-pdf` reply.
pub fn interpret_reply(reply: &HttpReply) -> PdfOutcome {
    let Ok(payload) = serde_json::from_str::<CreatePdfPayload>(&reply.body) else {
        return PdfOutcome::Unusable;
    };
    match payload {
        CreatePdfPayload {
            success: true,
            pdf_url: Some(pdf_url),
            message,
            ..
        } if reply.is_success() => PdfOutcome::Created {
            message: message.unwrap_or_default(),
            pdf_url,
        },
        CreatePdfPayload {
            error: Some(error),
            ..
        } => PdfOutcome::Rejected { error },
        _ => PdfOutcome::Unusable,
    }
}

/// Issues PDF requests and owns the resulting session.
pub struct PdfCreator {
    service: Arc<dyn ConversionService>,
    gate_on_upload: bool,
    session: PdfSession,
}

impl PdfCreator {
    pub fn new(service: Arc<dyn ConversionService>, config: &ClientConfig) -> Self {
        Self {
            service,
            gate_on_upload: config.gate_pdf_on_upload,
            session: PdfSession::default(),
        }
    }

    pub fn session(&self) -> &PdfSession {
        &self.session
    }

    /// Ask the service to render the extracted text as a PDF.
    ///
    /// With upload gating on (the default) this fails with
    /// [`ClientError::NoExtractedText`] unless `upload` succeeded; no request
    /// is made and the UI is left alone. Reply and transport failures end
    /// the session as `Failed`, not as `Err`, as does dropping the returned
    /// future before the reply arrives.
    pub async fn create_pdf(
        &mut self,
        upload: &UploadSession,
        ui: &dyn UiAdapter,
    ) -> Result<&PdfSession, ClientError> {
        if self.gate_on_upload && upload.state != SessionState::Succeeded {
            return Err(ClientError::NoExtractedText);
        }

        self.session = PdfSession {
            state: SessionState::InFlight,
            ..Default::default()
        };
        ui.set_enabled(Element::CreatePdfButton, false);
        ui.set_text(Element::CreatePdfButton, CREATING_PDF_LABEL);
        info!("Requesting PDF");

        let mut settle = SettleOnDrop {
            session: &mut self.session,
            ui,
        };
        let result = self.service.create_pdf().await;
        let session = &mut *settle.session;
        match result {
            Ok(reply) => match interpret_reply(&reply) {
                PdfOutcome::Created { message, pdf_url } => {
                    info!("PDF available at {}", pdf_url);
                    ui.set_text(Element::PdfMessage, &message);
                    ui.set_link(Element::DownloadLink, &pdf_url);
                    ui.set_visible(Element::PdfCard, true);
                    ui.scroll_into_view(Element::PdfCard);
                    session.state = SessionState::Succeeded;
                    session.message = Some(message);
                    session.download_url = Some(pdf_url);
                }
                PdfOutcome::Rejected { error } => {
                    warn!("PDF request rejected (HTTP {}): {}", reply.status, error);
                    ui.notify(&format!("Error: {error}"));
                    session.state = SessionState::Failed;
                    session.error_message = Some(error);
                }
                PdfOutcome::Unusable => {
                    warn!(
                        "PDF request returned HTTP {} with no usable payload",
                        reply.status
                    );
                    debug!("Body: {}", reply.body);
                    fail_generic(session, ui);
                }
            },
            Err(e) => {
                warn!("PDF request failed: {}", e);
                fail_generic(session, ui);
            }
        }

        ui.set_enabled(Element::CreatePdfButton, true);
        ui.set_text(Element::CreatePdfButton, CREATE_PDF_LABEL);
        drop(settle);
        Ok(&self.session)
    }

    /// Fetch the created PDF and write it to `dest`.
    ///
    /// Writes to a sibling temp file first and renames it into place, so
    /// `dest` never holds a partial PDF. Returns the number of bytes written.
    pub async fn download_pdf(&self, dest: impl AsRef<Path>) -> Result<u64, ClientError> {
        let url = self
            .session
            .download_url
            .as_deref()
            .ok_or(ClientError::NoPdf)?;
        let bytes = self.service.download(url).await?;
        let path = dest.as_ref();

        let write_err = |source| ClientError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let tmp_path = path.with_extension("pdf.tmp");
        tokio::fs::write(&tmp_path, &bytes).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(bytes.len() as u64)
    }
}

/// Settles a session left in flight when the request future is dropped.
struct SettleOnDrop<'a> {
    session: &'a mut PdfSession,
    ui: &'a dyn UiAdapter,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.session.state != SessionState::InFlight {
            return;
        }
        warn!("PDF request dropped before the service replied");
        self.session.state = SessionState::Failed;
        self.session.error_message = Some(PDF_ABANDONED_MESSAGE.to_string());
        self.ui.set_enabled(Element::CreatePdfButton, true);
        self.ui.set_text(Element::CreatePdfButton, CREATE_PDF_LABEL);
    }
}

fn fail_generic(session: &mut PdfSession, ui: &dyn UiAdapter) {
    ui.notify(PDF_FAILED_MESSAGE);
    session.state = SessionState::Failed;
    session.error_message = Some(PDF_FAILED_MESSAGE.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::scripted::{Endpoint, ScriptedService};
    use crate::ui::RecordingUi;
    use std::time::Duration;

    fn extracted() -> UploadSession {
        UploadSession {
            state: SessionState::Succeeded,
            progress_percent: Some(100),
            extracted_text: Some("Hello world".into()),
            ..Default::default()
        }
    }

    fn creator(service: ScriptedService, config: &ClientConfig) -> (PdfCreator, Arc<ScriptedService>) {
        let service = Arc::new(service);
        (
            PdfCreator::new(Arc::clone(&service) as Arc<dyn ConversionService>, config),
            service,
        )
    }

    const DONE: &str = r#"{"success": true, "message": "Done", "pdf_url": "/files/out.pdf"}"#;

    #[test]
    fn interprets_replies() {
        assert_eq!(
            interpret_reply(&HttpReply::new(200, DONE)),
            PdfOutcome::Created {
                message: "Done".into(),
                pdf_url: "/files/out.pdf".into()
            }
        );
        assert_eq!(
            interpret_reply(&HttpReply::new(400, r#"{"error": "No text to convert"}"#)),
            PdfOutcome::Rejected {
                error: "No text to convert".into()
            }
        );
        assert_eq!(
            interpret_reply(&HttpReply::new(500, "Internal Server Error")),
            PdfOutcome::Unusable
        );
        assert_eq!(
            interpret_reply(&HttpReply::new(200, r#"{"success": true}"#)),
            PdfOutcome::Unusable
        );
    }

    #[tokio::test]
    async fn success_reveals_download_link() {
        let (mut pdf, _) = creator(
            ScriptedService::new().pdf_reply(HttpReply::new(200, DONE)),
            &ClientConfig::default(),
        );
        let ui = RecordingUi::new();

        let session = pdf.create_pdf(&extracted(), &ui).await.unwrap();
        assert_eq!(session.state, SessionState::Succeeded);
        assert_eq!(session.download_url.as_deref(), Some("/files/out.pdf"));
        assert_eq!(session.message.as_deref(), Some("Done"));

        assert_eq!(ui.link(Element::DownloadLink).as_deref(), Some("/files/out.pdf"));
        assert_eq!(ui.is_visible(Element::PdfCard), Some(true));
        assert_eq!(ui.scrolled(), vec![Element::PdfCard]);
        assert_eq!(ui.is_enabled(Element::CreatePdfButton), Some(true));
        assert_eq!(ui.text(Element::CreatePdfButton).as_deref(), Some(CREATE_PDF_LABEL));
        assert!(ui
            .calls()
            .contains(&crate::ui::UiCall::Text(Element::CreatePdfButton, CREATING_PDF_LABEL.into())));
    }

    #[tokio::test]
    async fn rejection_is_prefixed_and_button_restored() {
        let (mut pdf, _) = creator(
            ScriptedService::new()
                .pdf_reply(HttpReply::new(400, r#"{"error": "No text to convert"}"#)),
            &ClientConfig::default(),
        );
        let ui = RecordingUi::new();

        let session = pdf.create_pdf(&extracted(), &ui).await.unwrap();
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(ui.notifications(), vec!["Error: No text to convert"]);
        assert_eq!(ui.is_enabled(Element::CreatePdfButton), Some(true));
        assert_eq!(ui.text(Element::CreatePdfButton).as_deref(), Some(CREATE_PDF_LABEL));
        assert_eq!(ui.is_visible(Element::PdfCard), None);
    }

    #[tokio::test]
    async fn transport_failure_uses_generic_message() {
        let (mut pdf, _) = creator(
            ScriptedService::new().pdf_error("connection reset"),
            &ClientConfig::default(),
        );
        let ui = RecordingUi::new();

        let session = pdf.create_pdf(&extracted(), &ui).await.unwrap();
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(ui.notifications(), vec![PDF_FAILED_MESSAGE]);
    }

    #[tokio::test]
    async fn gated_without_successful_upload() {
        let (mut pdf, service) = creator(
            ScriptedService::new().pdf_reply(HttpReply::new(200, DONE)),
            &ClientConfig::default(),
        );
        let ui = RecordingUi::new();

        let err = pdf.create_pdf(&UploadSession::default(), &ui).await.unwrap_err();
        assert!(matches!(err, ClientError::NoExtractedText));
        assert_eq!(service.request_count(Endpoint::CreatePdf), 0);
        assert!(ui.calls().is_empty());
        assert_eq!(pdf.session().state, SessionState::Idle);
    }

    #[tokio::test]
    async fn ungated_request_lets_server_decide() {
        let config = ClientConfig::builder()
            .gate_pdf_on_upload(false)
            .build()
            .unwrap();
        let (mut pdf, service) = creator(
            ScriptedService::new()
                .pdf_reply(HttpReply::new(400, r#"{"error": "No text to convert"}"#)),
            &config,
        );
        let ui = RecordingUi::new();

        let session = pdf.create_pdf(&UploadSession::default(), &ui).await.unwrap();
        assert_eq!(session.state, SessionState::Failed);
        assert_eq!(service.request_count(Endpoint::CreatePdf), 1);
    }

    #[tokio::test]
    async fn download_writes_file_atomically() {
        let (mut pdf, _) = creator(
            ScriptedService::new()
                .pdf_reply(HttpReply::new(200, DONE))
                .download("/files/out.pdf", b"%PDF-1.4 test".to_vec()),
            &ClientConfig::default(),
        );
        let ui = RecordingUi::new();
        pdf.create_pdf(&extracted(), &ui).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("out.pdf");
        let written = pdf.download_pdf(&dest).await.unwrap();
        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.4 test");
        assert!(!dest.with_extension("pdf.tmp").exists());
    }

    #[tokio::test]
    async fn download_without_pdf_fails() {
        let (pdf, _) = creator(ScriptedService::new(), &ClientConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let err = pdf.download_pdf(dir.path().join("out.pdf")).await.unwrap_err();
        assert!(matches!(err, ClientError::NoPdf));
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let (mut pdf, _) = creator(
            ScriptedService::new()
                .pdf_reply(HttpReply::new(200, DONE))
                .download("/files/out.pdf", b"%PDF-1.4 test".to_vec()),
            &ClientConfig::default(),
        );
        pdf.create_pdf(&extracted(), &RecordingUi::new()).await.unwrap();

        // A non-empty directory in the way makes the final rename fail.
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep.txt"), b"x").unwrap();

        let err = pdf.download_pdf(&dest).await.unwrap_err();
        assert!(matches!(err, ClientError::OutputWriteFailed { .. }), "{err:?}");
        assert!(!dest.with_extension("pdf.tmp").exists());
        assert!(dest.join("keep.txt").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_restores_button_and_can_be_retried() {
        let (mut pdf, service) = creator(
            ScriptedService::new()
                .pdf_stall()
                .pdf_reply(HttpReply::new(200, DONE)),
            &ClientConfig::default(),
        );
        let ui = RecordingUi::new();
        let upload = extracted();

        let timed_out =
            tokio::time::timeout(Duration::from_secs(5), pdf.create_pdf(&upload, &ui)).await;
        assert!(timed_out.is_err());
        assert_eq!(pdf.session().state, SessionState::Failed);
        assert_eq!(pdf.session().error_message.as_deref(), Some(PDF_ABANDONED_MESSAGE));
        assert_eq!(ui.is_enabled(Element::CreatePdfButton), Some(true));
        assert_eq!(ui.text(Element::CreatePdfButton).as_deref(), Some(CREATE_PDF_LABEL));
        assert!(ui.notifications().is_empty());

        let session = pdf.create_pdf(&upload, &ui).await.unwrap();
        assert_eq!(session.state, SessionState::Succeeded);
        assert_eq!(service.request_count(Endpoint::CreatePdf), 2);
    }
}
