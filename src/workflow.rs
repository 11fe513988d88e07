//! The whole page in one value: selection, upload, PDF, readiness.
//!
//! [`Workflow`] wires the controllers to one service and one UI adapter. Each
//! action runs the matching controller (which issues its transition-time UI
//! calls) and then re-derives the full [`UiState`] and applies it, so the UI
//! always ends an action in the state [`UiState::derive`] prescribes.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edgequake_ocr2pdf::{CandidateFile, ClientConfig, RecordingUi, ServicePhase, Workflow};
//!
//! # async fn run() -> Result<(), edgequake_ocr2pdf::ClientError> {
//! let ui = Arc::new(RecordingUi::new());
//! let mut flow = Workflow::connect(ClientConfig::default(), ui)?;
//! flow.start_polling(ServicePhase::Initializing);
//!
//! flow.select_files([CandidateFile::from_path("receipt.jpg")?])?;
//! let upload = flow.upload().await?;
//! println!("{:?}", upload.extracted_text);
//!
//! flow.create_pdf().await?;
//! flow.download_pdf("receipt.pdf").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::pdf::{PdfCreator, PdfSession};
use crate::poller::{PollerHandle, ServicePhase, StatusPoller};
use crate::selector::{CandidateFile, FileSelector, SelectedFile};
use crate::service::{ConversionService, HttpConversionService};
use crate::ui::{UiAdapter, UiState, ViewModel};
use crate::upload::{UploadController, UploadSession};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Selection, upload, PDF creation and readiness polling against one service.
pub struct Workflow {
    config: ClientConfig,
    service: Arc<dyn ConversionService>,
    ui: Arc<dyn UiAdapter>,
    selector: FileSelector,
    uploader: UploadController,
    pdf: PdfCreator,
    poller: Option<PollerHandle>,
    status: watch::Receiver<ServicePhase>,
}

impl Workflow {
    pub fn new(
        config: ClientConfig,
        service: Arc<dyn ConversionService>,
        ui: Arc<dyn UiAdapter>,
    ) -> Self {
        let (_, status) = watch::channel(ServicePhase::Initializing);
        Self {
            selector: FileSelector::new(config.max_file_bytes),
            uploader: UploadController::new(Arc::clone(&service)),
            pdf: PdfCreator::new(Arc::clone(&service), &config),
            poller: None,
            status,
            config,
            service,
            ui,
        }
    }

    /// Build a workflow over HTTP to `config.base_url`.
    pub fn connect(config: ClientConfig, ui: Arc<dyn UiAdapter>) -> Result<Self, ClientError> {
        let service = Arc::new(HttpConversionService::new(&config)?);
        Ok(Self::new(config, service, ui))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start readiness polling from `initial`, replacing (and cancelling)
    /// any earlier poller.
    ///
    /// Once the service has been seen ready this does nothing: readiness is
    /// never downgraded and no new poller is spawned.
    ///
    /// The returned receiver follows the phase; the workflow keeps its own.
    pub fn start_polling(&mut self, initial: ServicePhase) -> watch::Receiver<ServicePhase> {
        if self.status() == ServicePhase::Ready {
            debug!("Service already ready, not polling again");
            return self.status.clone();
        }
        crate::ui::render_phase(self.ui.as_ref(), initial);
        let handle = StatusPoller::new(Arc::clone(&self.service), &self.config)
            .with_ui(Arc::clone(&self.ui))
            .spawn(initial);
        self.status = handle.subscribe();
        self.poller = Some(handle);
        self.status.clone()
    }

    /// Stop polling. The phase keeps its last value.
    pub fn stop_polling(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.cancel();
        }
    }

    /// Wait until the poller reports `Ready`.
    ///
    /// Returns `false` if polling ends (halted, cancelled or never started)
    /// without the service becoming ready.
    pub async fn wait_ready(&mut self) -> bool {
        let ready = self
            .status
            .wait_for(|phase| *phase == ServicePhase::Ready)
            .await
            .is_ok();
        if !ready {
            debug!("Poller ended before the service was ready");
        }
        ready
    }

    pub fn status(&self) -> ServicePhase {
        *self.status.borrow()
    }

    /// Offer candidate files, as a file picker or drop would.
    ///
    /// A rejected candidate is reported through the UI notification as well
    /// as returned.
    pub fn select_files(
        &mut self,
        candidates: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<Option<&SelectedFile>, ClientError> {
        match self.selector.select(candidates) {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(None),
            Err(e) if e.is_validation() => {
                warn!("Selection rejected: {}", e);
                self.ui.notify(&e.to_string());
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        self.sync();
        Ok(self.selector.selected())
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selector.selected()
    }

    /// Upload the current selection.
    pub async fn upload(&mut self) -> Result<&UploadSession, ClientError> {
        let file = self
            .selector
            .selected()
            .ok_or(ClientError::NoFileSelected)?
            .clone();
        self.uploader.upload(&file, self.ui.as_ref()).await?;
        self.sync();
        Ok(self.uploader.session())
    }

    pub fn upload_session(&self) -> &UploadSession {
        self.uploader.session()
    }

    /// Ask the service for a PDF of the extracted text.
    pub async fn create_pdf(&mut self) -> Result<&PdfSession, ClientError> {
        self.pdf
            .create_pdf(self.uploader.session(), self.ui.as_ref())
            .await?;
        self.sync();
        Ok(self.pdf.session())
    }

    pub fn pdf_session(&self) -> &PdfSession {
        self.pdf.session()
    }

    /// Save the created PDF to `dest`. Returns the number of bytes written.
    pub async fn download_pdf(&self, dest: impl AsRef<Path>) -> Result<u64, ClientError> {
        self.pdf.download_pdf(dest).await
    }

    /// The steady-state UI picture for the current state.
    pub fn ui_state(&self) -> UiState {
        UiState::derive(ViewModel {
            selected: self.selector.selected(),
            upload: self.uploader.session(),
            pdf: self.pdf.session(),
            status: self.status(),
            gate_pdf_on_upload: self.config.gate_pdf_on_upload,
        })
    }

    /// Push the full UI state to the adapter.
    pub fn sync(&self) {
        self.ui_state().apply(self.ui.as_ref());
    }
}
