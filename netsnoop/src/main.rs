use anyhow::Context as _;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod capture;
mod config;
mod devices;
mod report;

use capture::{CaptureOptions, CaptureSession};
use config::{CliArgs, Config};
use report::Reporter;

fn main() -> ExitCode {
    let cli = CliArgs::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: CliArgs) -> anyhow::Result<()> {
    // Load config from file if provided, otherwise use defaults.
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(Path::new(config_path))
            .with_context(|| format!("failed to load config {config_path}"))?
    } else {
        Config::default()
    };
    config.merge_cli(&cli);

    // Logging goes to stderr; stdout carries the packet reports.
    let env_filter = if config.quiet {
        tracing_subscriber::EnvFilter::new("error")
    } else {
        tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        )
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let interface = match (config.interface.clone(), config.list_only) {
        (Some(name), _) => Some(name),
        (None, true) => None,
        (None, false) => anyhow::bail!("no interface given (use -i/--interface)"),
    };

    let mut reporter = Reporter::new(std::io::stdout(), config.format);

    // ── Device listing ────────────────────────────────────────────────
    match devices::list_devices() {
        Ok(devices) => {
            if devices.is_empty() {
                tracing::warn!("No capture devices found");
            }
            reporter
                .list_devices(&devices)
                .context("failed to write device list")?;
            if let Some(ref name) = interface {
                if devices.find(name).is_none() {
                    tracing::warn!("{} is not in the device list, trying it anyway", name);
                }
            }
        }
        Err(e) if config.list_only => return Err(e.into()),
        Err(e) => tracing::warn!("{}", e),
    }

    let Some(interface) = interface else {
        return Ok(());
    };

    // ── Graceful shutdown ─────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping capture...");
        r.store(false, Ordering::Relaxed);
    })
    .context("failed to install Ctrl-C handler")?;

    // ── Capture ───────────────────────────────────────────────────────
    tracing::info!("Filter: {}", config.filter);
    let session = CaptureSession::open(&interface, &CaptureOptions::from(&config))
        .and_then(|s| s.compile(&config.filter))
        .and_then(CaptureSession::install_filter)
        .map(|s| {
            s.set_handler(move |frame| reporter.handle_packet(frame))
                .with_running_flag(running)
        })
        .and_then(|s| s.run(config.target_count()))?;

    let stats = session.stats();
    tracing::info!(
        "Capture on {} finished: {} frames, {} reported, {} timeouts",
        session.interface(),
        stats.frames,
        stats.accepted,
        stats.timeouts
    );

    Ok(())
}
