use crate::config::FileConfig;
use crate::engine::axl::AxlClient;
use crate::engine::ris::RisClient;
use crate::engine::{PhoneRestarter, ReportMailer, SweepEngine};
use crate::mail::SmtpMailer;
use crate::model::{Phase, RunConfig, SweepEvent, SweepResult};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "colo-phones",
    version,
    about = "Report (and optionally restart) UCM phones registered via the colo Expressway"
)]
pub struct Cli {
    /// Path to the TOML config file (default: <config dir>/colo-phones/config.toml)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// UCM publisher host name or IP
    #[arg(long)]
    pub server: Option<String>,

    /// Registration IP of the colo gateway to look for
    #[arg(long)]
    pub target_ip: Option<String>,

    /// Use --restart true or --restart false to override the config file
    #[arg(long, action = clap::ArgAction::Set)]
    pub restart: Option<bool>,

    /// Do not email the report
    #[arg(long)]
    pub no_email: bool,

    /// Per-request timeout for the UCM APIs
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Print the result as JSON instead of the text report
    #[arg(long)]
    pub json: bool,

    /// Export the result as JSON
    #[arg(long)]
    pub export_json: Option<std::path::PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Build a `RunConfig` from the config file, environment and CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let mut file = match args.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::load_default()?,
    };
    file.apply_env();
    apply_overrides(&mut file, args);
    file.validate()?;
    Ok(file.into_run_config())
}

fn apply_overrides(file: &mut FileConfig, args: &Cli) {
    if let Some(server) = args.server.as_ref() {
        file.ucm.server = server.clone();
    }
    if let Some(ip) = args.target_ip.as_ref() {
        file.target_ip = ip.clone();
    }
    if let Some(restart) = args.restart {
        file.restart_enabled = restart;
    }
    if args.no_email {
        file.mail.enabled = false;
    }
    if let Some(timeout) = args.timeout {
        file.ucm.timeout = Duration::from(timeout);
    }
}

/// Wire up the API clients. AXL is only set up when restarts are enabled.
fn build_engine(cfg: RunConfig) -> Result<SweepEngine> {
    let source = RisClient::new(&cfg).context("failed to set up RIS client")?;
    let restarter: Option<Box<dyn PhoneRestarter>> = if cfg.restart_enabled {
        Some(Box::new(
            AxlClient::new(&cfg).context("failed to set up AXL client")?,
        ))
    } else {
        None
    };
    let mailer: Option<Box<dyn ReportMailer>> = match cfg.mail.clone() {
        Some(settings) => Some(Box::new(
            SmtpMailer::new(settings).context("failed to set up SMTP transport")?,
        )),
        None => None,
    };
    Ok(SweepEngine::new(cfg, Box::new(source), restarter, mailer))
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let engine = build_engine(cfg)?;

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<SweepEvent>();
    let handle = tokio::spawn(async move { engine.run(evt_tx).await });

    while let Some(ev) = evt_rx.recv().await {
        render_event(ev, args.json, &out_tx);
    }

    let outcome = handle.await.context("sweep task failed")?;
    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            // Flush whatever was printed before the failure.
            drop(out_tx);
            let _ = out_handle.await;
            return Err(e);
        }
    };

    if args.json {
        let out = serde_json::to_string_pretty(&result)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    }
    let exported = handle_exports(&args, &result);
    if let Ok(Some(path)) = exported.as_ref() {
        let _ = out_tx.send(OutputLine::Stderr(format!("Exported JSON: {}", path.display())));
    }

    drop(out_tx);
    let _ = out_handle.await;
    exported.map(|_| ())
}

fn render_event(ev: SweepEvent, json: bool, out_tx: &mpsc::UnboundedSender<OutputLine>) {
    match ev {
        SweepEvent::PhaseStarted { phase } => {
            let label = match phase {
                Phase::Query => "Querying RIS",
                Phase::Restart => "Restarting phones",
                Phase::Mail => "Sending email",
            };
            let _ = out_tx.send(OutputLine::Stderr(format!("== {label} ==")));
        }
        SweepEvent::DeviceFound { device } => {
            tracing::debug!(
                device = %device.name,
                node = device.node.as_deref().unwrap_or("-"),
                status = device.status.as_deref().unwrap_or("-"),
                "device registered via colo gateway"
            );
        }
        SweepEvent::RestartIssued { outcome } => {
            let msg = if outcome.ok {
                format!("Restarted {}", outcome.name)
            } else {
                format!("Restart failed for {}: {}", outcome.name, outcome.detail)
            };
            let _ = out_tx.send(OutputLine::Stderr(msg));
        }
        SweepEvent::ReportReady { lines } => {
            if !json {
                let _ = out_tx.send(OutputLine::Stdout(String::new()));
                for line in lines {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
        }
        SweepEvent::Info(info) => {
            let _ = out_tx.send(OutputLine::Stderr(info.to_message()));
        }
    }
}

/// Handle the JSON export, returning the written path if any.
fn handle_exports(args: &Cli, result: &SweepResult) -> Result<Option<std::path::PathBuf>> {
    match args.export_json.as_deref() {
        Some(p) => {
            crate::storage::export_json(p, result)?;
            Ok(Some(p.to_path_buf()))
        }
        None => Ok(None),
    }
}
