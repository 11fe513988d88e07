//! Service readiness polling.
//!
//! The OCR backend loads its model in the background after start-up and
//! reports `"initializing"` until it is done. The poller asks `/status`,
//! publishes the answer, and if the backend is still initializing sleeps one
//! interval (measured from the response, not the request) and asks again.
//! It stops for good once it sees `"ready"`.
//!
//! ## Failure policy
//!
//! A failed poll (no response, unparseable body, unknown status) is logged
//! and, by default, ends polling: the label stays at "initializing" and a
//! backend that is down is not hammered. Set
//! [`crate::ClientConfig::auto_resume_polling`] to keep polling instead.
//!
//! ## Shared state
//!
//! The phase lives in a `tokio::sync::watch` channel. The poller task owns
//! the only sender, so the phase has a single writer; anyone can hold a
//! receiver.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::service::{ConversionService, StatusPayload};
use crate::ui::{render_phase, UiAdapter};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Backend readiness. Only ever moves `Initializing → Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    #[default]
    Initializing,
    Ready,
}

impl ServicePhase {
    /// Parse the `status` field of a `/status` reply.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initializing" => Some(ServicePhase::Initializing),
            "ready" => Some(ServicePhase::Ready),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServicePhase::Initializing => "initializing",
            ServicePhase::Ready => "ready",
        }
    }

    /// Style class for the status label.
    pub fn css_class(self) -> &'static str {
        match self {
            ServicePhase::Initializing => "status-initializing",
            ServicePhase::Ready => "status-ready",
        }
    }
}

/// How a polling run ended.
#[derive(Debug)]
pub enum PollOutcome {
    /// The starting phase was already `Ready`; no request was made.
    AlreadyReady,
    /// `"ready"` was observed after `polls` requests.
    Ready { polls: usize },
    /// A poll failed and auto-resume is off.
    Halted { polls: usize, error: ClientError },
}

/// Repeats `/status` requests until the backend is ready.
pub struct StatusPoller {
    service: Arc<dyn ConversionService>,
    interval: Duration,
    auto_resume: bool,
    ui: Option<Arc<dyn UiAdapter>>,
}

impl StatusPoller {
    pub fn new(service: Arc<dyn ConversionService>, config: &ClientConfig) -> Self {
        Self {
            service,
            interval: config.poll_interval(),
            auto_resume: config.auto_resume_polling,
            ui: None,
        }
    }

    /// Also mirror every observed phase onto the status label.
    pub fn with_ui(mut self, ui: Arc<dyn UiAdapter>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Start polling on a background task from `initial`.
    ///
    /// When `initial` is already `Ready` no task is started and no request
    /// is made.
    pub fn spawn(self, initial: ServicePhase) -> PollerHandle {
        let (tx, rx) = watch::channel(initial);
        let task = if initial == ServicePhase::Ready {
            debug!("Service already ready, poller not started");
            None
        } else {
            Some(tokio::spawn(async move { self.run(&tx).await }))
        };
        PollerHandle { task, status: rx }
    }

    /// Poll until the exit predicate (`phase == Ready`) holds or a poll fails.
    ///
    /// Runs on the caller's task; [`StatusPoller::spawn`] is the detached
    /// variant.
    pub async fn run(&self, status: &watch::Sender<ServicePhase>) -> PollOutcome {
        if *status.borrow() == ServicePhase::Ready {
            return PollOutcome::AlreadyReady;
        }

        let mut polls = 0;
        loop {
            polls += 1;
            match self.poll_once().await {
                Ok(phase) => {
                    status.send_replace(phase);
                    if let Some(ref ui) = self.ui {
                        render_phase(ui.as_ref(), phase);
                    }
                    if phase == ServicePhase::Ready {
                        info!("Service ready after {} status polls", polls);
                        return PollOutcome::Ready { polls };
                    }
                    debug!("Service still initializing (poll {})", polls);
                }
                Err(error) => {
                    if !self.auto_resume {
                        warn!("Status poll {} failed, polling stopped: {}", polls, error);
                        return PollOutcome::Halted { polls, error };
                    }
                    warn!("Status poll {} failed, retrying: {}", polls, error);
                }
            }
            sleep(self.interval).await;
        }
    }

    async fn poll_once(&self) -> Result<ServicePhase, ClientError> {
        let reply = self.service.status().await?;
        let payload: StatusPayload =
            serde_json::from_str(&reply.body).map_err(|e| ClientError::StatusPayload {
                detail: format!("HTTP {}: {e}", reply.status),
            })?;
        ServicePhase::parse(&payload.status).ok_or_else(|| ClientError::StatusPayload {
            detail: format!("unknown status '{}'", payload.status),
        })
    }
}

/// Handle to a spawned poller.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct PollerHandle {
    task: Option<JoinHandle<PollOutcome>>,
    status: watch::Receiver<ServicePhase>,
}

impl PollerHandle {
    /// A receiver for the current phase; clone it as often as needed.
    pub fn subscribe(&self) -> watch::Receiver<ServicePhase> {
        self.status.clone()
    }

    pub fn phase(&self) -> ServicePhase {
        *self.status.borrow()
    }

    /// Stop polling. The phase stays at its last published value.
    pub fn cancel(&self) {
        if let Some(ref task) = self.task {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the poller to end. `None` if it was cancelled.
    pub async fn join(mut self) -> Option<PollOutcome> {
        match self.task.take() {
            None => Some(PollOutcome::AlreadyReady),
            Some(task) => task.await.ok(),
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::scripted::{Endpoint, ScriptedService};
    use crate::service::HttpReply;
    use crate::ui::{Element, RecordingUi};

    fn poller(service: &Arc<ScriptedService>, config: &ClientConfig) -> StatusPoller {
        StatusPoller::new(Arc::clone(service) as Arc<dyn ConversionService>, config)
    }

    #[test]
    fn phase_parsing() {
        assert_eq!(ServicePhase::parse("ready"), Some(ServicePhase::Ready));
        assert_eq!(
            ServicePhase::parse("initializing"),
            Some(ServicePhase::Initializing)
        );
        assert_eq!(ServicePhase::parse("READY"), None);
        assert_eq!(ServicePhase::Ready.css_class(), "status-ready");
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_ready_with_fixed_spacing() {
        let service = Arc::new(
            ScriptedService::new()
                .status("initializing")
                .status("initializing")
                .status("ready"),
        );
        let handle = poller(&service, &ClientConfig::default()).spawn(ServicePhase::Initializing);
        let rx = handle.subscribe();

        let outcome = handle.join().await.unwrap();
        assert!(matches!(outcome, PollOutcome::Ready { polls: 3 }));
        assert_eq!(*rx.borrow(), ServicePhase::Ready);

        let times = service.requests(Endpoint::Status);
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(2000));
        }

        // Nothing further once ready, however long we wait.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(service.request_count(Endpoint::Status), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn already_ready_never_polls() {
        let service = Arc::new(ScriptedService::new().status("ready"));
        let handle = poller(&service, &ClientConfig::default()).spawn(ServicePhase::Ready);
        assert!(handle.is_finished());
        assert!(matches!(handle.join().await, Some(PollOutcome::AlreadyReady)));
        assert_eq!(service.request_count(Endpoint::Status), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_halts_silently_by_default() {
        let service = Arc::new(
            ScriptedService::new()
                .status("initializing")
                .status_error("connection refused")
                .status("ready"),
        );
        let ui = Arc::new(RecordingUi::new());
        let handle = poller(&service, &ClientConfig::default())
            .with_ui(ui.clone())
            .spawn(ServicePhase::Initializing);
        let rx = handle.subscribe();

        let outcome = handle.join().await.unwrap();
        assert!(matches!(outcome, PollOutcome::Halted { polls: 2, .. }));
        assert_eq!(*rx.borrow(), ServicePhase::Initializing);
        assert_eq!(
            ui.text(Element::ServiceStatus).as_deref(),
            Some("initializing")
        );
        assert!(ui.notifications().is_empty());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(service.request_count(Endpoint::Status), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_resume_keeps_polling_after_failure() {
        let service = Arc::new(
            ScriptedService::new()
                .status_error("connection refused")
                .status_reply(HttpReply::new(502, "<html>Bad Gateway</html>"))
                .status("ready"),
        );
        let config = ClientConfig::builder()
            .auto_resume_polling(true)
            .build()
            .unwrap();
        let outcome = poller(&service, &config)
            .spawn(ServicePhase::Initializing)
            .join()
            .await
            .unwrap();
        assert!(matches!(outcome, PollOutcome::Ready { polls: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_is_a_failure() {
        let service = Arc::new(ScriptedService::new().status("warming-up"));
        let outcome = poller(&service, &ClientConfig::default())
            .spawn(ServicePhase::Initializing)
            .join()
            .await
            .unwrap();
        match outcome {
            PollOutcome::Halted { error, .. } => {
                assert!(error.to_string().contains("warming-up"))
            }
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling() {
        let mut service = ScriptedService::new();
        for _ in 0..100 {
            service = service.status("initializing");
        }
        let service = Arc::new(service);
        let handle = poller(&service, &ClientConfig::default()).spawn(ServicePhase::Initializing);

        sleep(Duration::from_millis(4500)).await;
        handle.cancel();
        let seen = service.request_count(Endpoint::Status);
        assert_eq!(seen, 3);
        assert!(handle.join().await.is_none());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(service.request_count(Endpoint::Status), seen);
    }
}
