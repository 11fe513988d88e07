//! UI state sync: the bridge between controller state and whatever draws it.
//!
//! Controllers never touch widgets directly. They talk to an injected
//! [`UiAdapter`], and the steady-state picture (what is enabled, what is
//! visible, what the labels say) is computed by the pure
//! [`UiState::derive`] and pushed with [`UiState::apply`]. One-shot effects
//! (scrolling a surface into view, a blocking notification) are issued by the
//! controllers at the moment they happen.
//!
//! [`RecordingUi`] is a headless adapter that records every call; the CLI has
//! its own terminal adapter.

use crate::pdf::PdfSession;
use crate::poller::ServicePhase;
use crate::selector::SelectedFile;
use crate::session::SessionState;
use crate::upload::UploadSession;
use serde::Serialize;
use std::sync::Mutex;

/// Label of the create-PDF action while idle.
pub const CREATE_PDF_LABEL: &str = "Create PDF";
/// Label of the create-PDF action while a request is running.
pub const CREATING_PDF_LABEL: &str = "Creating PDF...";

/// The UI elements the workflow drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Element {
    /// `"<name> (<size>)"` next to the drop area.
    FileInfo,
    UploadButton,
    ProgressContainer,
    /// Surface holding the extracted text and the create-PDF action.
    ResultCard,
    ExtractedText,
    CreatePdfButton,
    /// Surface holding the PDF message and download link.
    PdfCard,
    PdfMessage,
    DownloadLink,
    /// Service readiness label.
    ServiceStatus,
}

/// The capabilities the workflow needs from a front-end.
///
/// Implementations must be `Send + Sync`: the status poller runs on its own
/// task and updates the status label from there. The optional capabilities
/// default to no-ops.
pub trait UiAdapter: Send + Sync {
    fn set_text(&self, element: Element, text: &str);

    fn set_visible(&self, element: Element, visible: bool);

    fn set_enabled(&self, element: Element, enabled: bool);

    /// Width of the progress bar, in percent.
    fn set_progress_width(&self, percent: u8);

    fn scroll_into_view(&self, element: Element) {
        let _ = element;
    }

    /// Point a link element at `url`.
    fn set_link(&self, element: Element, url: &str) {
        let _ = (element, url);
    }

    /// Replace the style class of an element.
    fn set_class(&self, element: Element, class: &str) {
        let _ = (element, class);
    }

    /// Blocking, user-facing notification (an `alert` in a browser).
    fn notify(&self, message: &str);
}

/// Read-only snapshot of everything the UI depends on.
#[derive(Debug, Clone, Copy)]
pub struct ViewModel<'a> {
    pub selected: Option<&'a SelectedFile>,
    pub upload: &'a UploadSession,
    pub pdf: &'a PdfSession,
    pub status: ServicePhase,
    /// Whether create-PDF requires a successful upload.
    pub gate_pdf_on_upload: bool,
}

/// The complete steady-state picture of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub file_label: String,
    pub upload_enabled: bool,
    pub progress_visible: bool,
    pub progress_width: u8,
    pub result_visible: bool,
    pub extracted_text: String,
    pub create_pdf_enabled: bool,
    pub create_pdf_label: &'static str,
    pub pdf_visible: bool,
    pub pdf_message: String,
    pub download_url: Option<String>,
    pub status_text: &'static str,
    pub status_class: &'static str,
}

impl UiState {
    pub fn derive(view: ViewModel<'_>) -> Self {
        let upload_in_flight = view.upload.state == SessionState::InFlight;
        let pdf_in_flight = view.pdf.state == SessionState::InFlight;
        let pdf_allowed =
            !view.gate_pdf_on_upload || view.upload.state == SessionState::Succeeded;

        Self {
            file_label: view.selected.map(SelectedFile::label).unwrap_or_default(),
            upload_enabled: view.selected.is_some() && !upload_in_flight,
            progress_visible: upload_in_flight,
            progress_width: view.upload.progress_percent.unwrap_or(0),
            result_visible: view.upload.extracted_text.is_some(),
            extracted_text: view.upload.extracted_text.clone().unwrap_or_default(),
            create_pdf_enabled: !pdf_in_flight && pdf_allowed,
            create_pdf_label: if pdf_in_flight {
                CREATING_PDF_LABEL
            } else {
                CREATE_PDF_LABEL
            },
            pdf_visible: view.pdf.download_url.is_some(),
            pdf_message: view.pdf.message.clone().unwrap_or_default(),
            download_url: view.pdf.download_url.clone(),
            status_text: view.status.as_str(),
            status_class: view.status.css_class(),
        }
    }

    /// Push every field to `ui`.
    pub fn apply(&self, ui: &dyn UiAdapter) {
        ui.set_text(Element::FileInfo, &self.file_label);
        ui.set_enabled(Element::UploadButton, self.upload_enabled);

        ui.set_visible(Element::ProgressContainer, self.progress_visible);
        ui.set_progress_width(self.progress_width);

        ui.set_text(Element::ExtractedText, &self.extracted_text);
        ui.set_visible(Element::ResultCard, self.result_visible);
        ui.set_enabled(Element::CreatePdfButton, self.create_pdf_enabled);
        ui.set_text(Element::CreatePdfButton, self.create_pdf_label);

        ui.set_text(Element::PdfMessage, &self.pdf_message);
        if let Some(ref url) = self.download_url {
            ui.set_link(Element::DownloadLink, url);
        }
        ui.set_visible(Element::PdfCard, self.pdf_visible);

        render_status(ui, self.status_text, self.status_class);
    }
}

/// Update just the readiness label. Used by the poller, which has no access
/// to the sessions.
pub fn render_phase(ui: &dyn UiAdapter, phase: ServicePhase) {
    render_status(ui, phase.as_str(), phase.css_class());
}

fn render_status(ui: &dyn UiAdapter, text: &str, class: &str) {
    ui.set_text(Element::ServiceStatus, text);
    ui.set_class(Element::ServiceStatus, class);
}

// ── Headless adapter ─────────────────────────────────────────────────────

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    Text(Element, String),
    Visible(Element, bool),
    Enabled(Element, bool),
    ProgressWidth(u8),
    Scroll(Element),
    Link(Element, String),
    Class(Element, String),
    Notify(String),
}

/// A [`UiAdapter`] that records calls instead of drawing anything.
///
/// The query helpers answer with the *last* value set for an element, which
/// is what a real page would be showing.
#[derive(Debug, Default)]
pub struct RecordingUi {
    calls: Mutex<Vec<UiCall>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn notifications(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                UiCall::Notify(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn text(&self, element: Element) -> Option<String> {
        self.lock().iter().rev().find_map(|c| match c {
            UiCall::Text(e, t) if *e == element => Some(t.clone()),
            _ => None,
        })
    }

    pub fn is_visible(&self, element: Element) -> Option<bool> {
        self.lock().iter().rev().find_map(|c| match c {
            UiCall::Visible(e, v) if *e == element => Some(*v),
            _ => None,
        })
    }

    pub fn is_enabled(&self, element: Element) -> Option<bool> {
        self.lock().iter().rev().find_map(|c| match c {
            UiCall::Enabled(e, v) if *e == element => Some(*v),
            _ => None,
        })
    }

    pub fn link(&self, element: Element) -> Option<String> {
        self.lock().iter().rev().find_map(|c| match c {
            UiCall::Link(e, u) if *e == element => Some(u.clone()),
            _ => None,
        })
    }

    pub fn class(&self, element: Element) -> Option<String> {
        self.lock().iter().rev().find_map(|c| match c {
            UiCall::Class(e, u) if *e == element => Some(u.clone()),
            _ => None,
        })
    }

    /// Every progress width set, in order.
    pub fn progress_widths(&self) -> Vec<u8> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                UiCall::ProgressWidth(w) => Some(*w),
                _ => None,
            })
            .collect()
    }

    pub fn scrolled(&self) -> Vec<Element> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                UiCall::Scroll(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: UiCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UiCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UiAdapter for RecordingUi {
    fn set_text(&self, element: Element, text: &str) {
        self.record(UiCall::Text(element, text.to_string()));
    }

    fn set_visible(&self, element: Element, visible: bool) {
        self.record(UiCall::Visible(element, visible));
    }

    fn set_enabled(&self, element: Element, enabled: bool) {
        self.record(UiCall::Enabled(element, enabled));
    }

    fn set_progress_width(&self, percent: u8) {
        self.record(UiCall::ProgressWidth(percent));
    }

    fn scroll_into_view(&self, element: Element) {
        self.record(UiCall::Scroll(element));
    }

    fn set_link(&self, element: Element, url: &str) {
        self.record(UiCall::Link(element, url.to_string()));
    }

    fn set_class(&self, element: Element, class: &str) {
        self.record(UiCall::Class(element, class.to_string()));
    }

    fn notify(&self, message: &str) {
        self.record(UiCall::Notify(message.to_string()));
    }
}
