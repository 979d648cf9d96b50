use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::logs_dir;

/// Console plus a daily log file under `<data_dir>/logs`. `RUST_LOG` overrides
/// the default `info` level. Keep the guard alive for the life of the app.
pub fn init(data_dir: &Path) -> Result<WorkerGuard> {
    let dir = logs_dir(data_dir);
    std::fs::create_dir_all(&dir).context("create logs dir")?;

    let file = tracing_appender::rolling::daily(&dir, "stillpoint.log");
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .context("install tracing subscriber")?;

    Ok(guard)
}
