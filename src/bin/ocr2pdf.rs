//! CLI binary for edgequake-ocr2pdf.
//!
//! A thin shim over the library crate: maps CLI flags to `ClientConfig`,
//! renders the workflow's UI calls on the terminal and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_ocr2pdf::{
    CandidateFile, ClientConfig, Element, ServicePhase, SessionState, UiAdapter, Workflow,
    DEFAULT_BASE_URL,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal UI adapter using indicatif ──────────────────────────────────────

/// Renders the workflow on a terminal: the upload progress container becomes
/// an indicatif bar, notifications and milestones go to stderr. Scrolling
/// has no terminal meaning and is ignored.
struct TerminalUi {
    /// `None` when progress display is off.
    bar: Option<ProgressBar>,
    quiet: bool,
    /// Last status label printed, to avoid repeating it on every sync.
    status: Mutex<Option<String>>,
    /// Remembered so the PDF milestone line can show where it lives.
    pdf_url: Mutex<Option<String>>,
}

impl TerminalUi {
    fn new(show_progress: bool, quiet: bool) -> Arc<Self> {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::hidden();
            let style = ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
            bar.set_style(style);
            bar.set_prefix("Uploading");
            bar
        });
        Arc::new(Self {
            bar,
            quiet,
            status: Mutex::new(None),
            pdf_url: Mutex::new(None),
        })
    }

    /// Print a line without tearing an active progress bar.
    fn line(&self, msg: String) {
        match self.bar {
            Some(ref bar) if !bar.is_finished() && !bar.is_hidden() => bar.println(msg),
            _ => eprintln!("{msg}"),
        }
    }

    fn start_bar(&self) {
        if let Some(ref bar) = self.bar {
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            bar.set_length(100);
            bar.set_position(0);
            bar.reset_elapsed();
            bar.enable_steady_tick(Duration::from_millis(80));
        }
    }

    fn stop_bar(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
            bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }
    }
}

impl UiAdapter for TerminalUi {
    fn set_text(&self, element: Element, text: &str) {
        if element != Element::ServiceStatus || self.quiet {
            return;
        }
        let mut last = self.status.lock().unwrap_or_else(|p| p.into_inner());
        if last.as_deref() == Some(text) {
            return;
        }
        *last = Some(text.to_string());
        drop(last);

        let marker = if text == ServicePhase::Ready.as_str() {
            green("●")
        } else {
            cyan("◌")
        };
        self.line(format!("{} service {}", marker, bold(text)));
    }

    fn set_visible(&self, element: Element, visible: bool) {
        match (element, visible) {
            (Element::ProgressContainer, true) => self.start_bar(),
            (Element::ProgressContainer, false) => self.stop_bar(),
            (Element::ResultCard, true) if !self.quiet => {
                self.line(format!("{} text extracted", green("✔")));
            }
            (Element::PdfCard, true) if !self.quiet => {
                let url = self.pdf_url.lock().unwrap_or_else(|p| p.into_inner()).clone();
                self.line(format!(
                    "{} PDF ready  {}",
                    green("✔"),
                    dim(url.as_deref().unwrap_or(""))
                ));
            }
            _ => {}
        }
    }

    fn set_enabled(&self, _element: Element, _enabled: bool) {}

    fn set_progress_width(&self, percent: u8) {
        if let Some(ref bar) = self.bar {
            bar.set_position(u64::from(percent));
        }
    }

    fn set_link(&self, element: Element, url: &str) {
        if element == Element::DownloadLink {
            *self.pdf_url.lock().unwrap_or_else(|p| p.into_inner()) = Some(url.to_string());
        }
    }

    fn notify(&self, message: &str) {
        // Notifications are the failure channel; shown even with --quiet.
        self.line(format!("{} {}", red("✘"), red(message)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text from an image (stdout)
  ocr2pdf receipt.jpg

  # Wait for the OCR model to load, then extract
  ocr2pdf --wait-ready scan.png

  # Extract and save the generated PDF
  ocr2pdf scan.png -o scan.pdf

  # Against another server, text to a file
  ocr2pdf --server http://ocr.local:8080 scan.png --text-output scan.txt

  # JSON summary of both sessions
  ocr2pdf --json --pdf scan.png

ENVIRONMENT VARIABLES:
  OCR2PDF_SERVER          Service base URL (default http://127.0.0.1:5000)
  OCR2PDF_OUTPUT          Where to save the generated PDF
  OCR2PDF_TIMEOUT         Per-request timeout in seconds
  RUST_LOG                Overrides the log filter
"#;

/// Extract text from an image with an OCR service and turn it into a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "ocr2pdf",
    version,
    about = "Extract text from an image with an OCR service and turn it into a PDF",
    long_about = "Upload an image to an image-to-text service, print the extracted text and \
optionally have the service render it as a PDF, downloaded to a local file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file to upload.
    image: PathBuf,

    /// Service base URL.
    #[arg(long, env = "OCR2PDF_SERVER", default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Poll /status and wait for the service to be ready before uploading.
    #[arg(long, env = "OCR2PDF_WAIT_READY")]
    wait_ready: bool,

    /// Ask the service to create a PDF after a successful upload.
    #[arg(long, env = "OCR2PDF_PDF")]
    pdf: bool,

    /// Save the generated PDF here (implies --pdf).
    #[arg(short, long, env = "OCR2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the extracted text to this file instead of stdout.
    #[arg(long, env = "OCR2PDF_TEXT_OUTPUT")]
    text_output: Option<PathBuf>,

    /// Delay between readiness polls, in milliseconds.
    #[arg(long, env = "OCR2PDF_POLL_INTERVAL_MS", default_value_t = 2000,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Keep polling after a failed status request instead of giving up.
    #[arg(long, env = "OCR2PDF_AUTO_RESUME_POLLING")]
    auto_resume_polling: bool,

    /// Request the PDF even if the upload did not succeed.
    #[arg(long, env = "OCR2PDF_NO_PDF_GATE")]
    no_pdf_gate: bool,

    /// Per-request timeout in seconds (default: none).
    #[arg(long, env = "OCR2PDF_TIMEOUT",
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Refuse images larger than this many bytes.
    #[arg(long, env = "OCR2PDF_MAX_FILE_BYTES")]
    max_file_bytes: Option<u64>,

    /// Print the final upload and PDF sessions as JSON.
    #[arg(long, env = "OCR2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and milestone lines carry the feedback; library INFO
    // logs would only interleave with them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let ui = TerminalUi::new(show_progress, cli.quiet || cli.json);
    let mut flow = Workflow::connect(config, ui).context("Failed to create HTTP client")?;

    // ── Readiness ────────────────────────────────────────────────────────
    if cli.wait_ready {
        flow.start_polling(ServicePhase::Initializing);
        if !flow.wait_ready().await {
            bail!(
                "Service at {} did not become ready (status polling stopped)",
                cli.server
            );
        }
    }

    // ── Select + upload ──────────────────────────────────────────────────
    let candidate = CandidateFile::from_path(&cli.image)
        .with_context(|| format!("Cannot use {}", cli.image.display()))?;
    flow.select_files([candidate]).context("Invalid image")?;

    let upload = flow.upload().await.context("Upload failed")?.clone();
    let text = upload.extracted_text.clone().unwrap_or_default();

    if upload.state != SessionState::Succeeded {
        let reason = upload.error_message.as_deref().unwrap_or("unknown error");
        if !cli.pdf_after_failed_upload() {
            bail!("Upload failed: {}", reason);
        }
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  upload failed: {}  {}",
                red("✘"),
                reason,
                dim("(requesting the PDF anyway)")
            );
        }
    } else if let Some(ref path) = cli.text_output {
        tokio::fs::write(path, &text)
            .await
            .with_context(|| format!("Failed to write text to {}", path.display()))?;
        if !cli.quiet && !cli.json {
            eprintln!("{}  text  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else if !cli.json {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    // ── PDF ──────────────────────────────────────────────────────────────
    if cli.wants_pdf() {
        let pdf = flow.create_pdf().await.context("PDF creation failed")?;
        if pdf.state != SessionState::Succeeded {
            bail!(
                "PDF creation failed: {}",
                pdf.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        if let Some(ref path) = cli.output {
            let bytes = flow
                .download_pdf(path)
                .await
                .context("PDF download failed")?;
            if !cli.quiet && !cli.json {
                eprintln!(
                    "{}  {}  →  {}",
                    green("✔"),
                    dim(&edgequake_ocr2pdf::format_size(bytes)),
                    bold(&path.display().to_string()),
                );
            }
        }
    }

    if cli.json {
        let summary = serde_json::json!({
            "upload": flow.upload_session(),
            "pdf": flow.pdf_session(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise output")?
        );
    }

    Ok(())
}

impl Cli {
    fn wants_pdf(&self) -> bool {
        self.pdf || self.output.is_some()
    }

    /// With the gate off, a failed upload still goes on to the PDF request
    /// and the service decides.
    fn pdf_after_failed_upload(&self) -> bool {
        self.no_pdf_gate && self.wants_pdf()
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.server.as_str())
        .poll_interval_ms(cli.poll_interval_ms)
        .auto_resume_polling(cli.auto_resume_polling)
        .gate_pdf_on_upload(!cli.no_pdf_gate);

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(bytes) = cli.max_file_bytes {
        builder = builder.max_file_bytes(bytes);
    }

    builder.build().context("Invalid configuration")
}
