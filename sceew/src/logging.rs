//! Global `tracing` setup shared by the daemon and the shell.

use anyhow::Context;
use std::fs::File;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Installs the console subscriber plus, when configured, a plain-text file
/// layer that only receives WARN and above. The file is truncated on every
/// start. `RUST_LOG` overrides `config.level`.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level `{}`", config.level))?;

    let console = fmt::layer().with_target(false).with_filter(filter);

    let error_file = if config.error_file.is_empty() {
        None
    } else {
        let file = File::create(&config.error_file)
            .with_context(|| format!("cannot create error log `{}`", config.error_file))?;
        Some(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::WARN),
        )
    };

    tracing_subscriber::registry()
        .with(console)
        .with(error_file)
        .try_init()
        .context("a global tracing subscriber is already installed")?;
    Ok(())
}
