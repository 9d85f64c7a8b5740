mod cli;
mod error_fmt;
mod run;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use sorter_core::{Fixed, SorterError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = sorter_config::load_file(&cli.config)?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(SorterError::Config(e.to_string())))?;

    // Held until exit so the file writer flushes.
    let _log_guard = init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "configuration loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Run {
            duration_ms,
            carts,
            target_speed,
        } => {
            let target_speed = target_speed
                .map(|s| {
                    s.parse::<Fixed>().map_err(|e| {
                        eyre::Report::new(SorterError::Validation(format!(
                            "--target-speed {s:?}: {e}"
                        )))
                    })
                })
                .transpose()?;
            let opts = run::RunOpts {
                duration: duration_ms.map(Duration::from_millis),
                carts,
                target_speed,
            };
            let report = run::run_line(&cfg, &opts, shutdown)?;
            if cli.json {
                println!("{}", report.to_json());
            } else {
                println!("{}", report.to_text());
            }
        }
        Commands::SelfCheck => {
            let carts = run::self_check(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "status": "ok", "ring_length": carts }));
            } else {
                println!("self-check ok: ring of {carts} carts discovered");
            }
        }
        Commands::Health => {
            let health = run::health(&cfg);
            if cli.json {
                println!("{health}");
            } else {
                println!("OK");
            }
        }
    }
    Ok(())
}

/// Console logs go to stderr so stdout stays parseable. An optional JSON file
/// sink is added when `[logging].file` is set.
fn init_tracing(
    cli: &Cli,
    logging: &sorter_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::new(spec),
        _ => EnvFilter::new(level),
    };

    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let mut guard = None;
    let file_layer = match logging.file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, g) = tracing_appender::non_blocking(appender);
            guard = Some(g);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))?;
    Ok(guard)
}
