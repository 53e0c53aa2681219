//! Subscriber setup: console on stderr (stdout carries the JSON transport),
//! plus an optional JSON-lines file from `[logging]`.

use std::path::Path;

use eyre::WrapErr;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `RUST_LOG` wins over `--log-level` for the console.
pub fn init(json: bool, level: &str, logging: &welder_config::Logging) -> eyre::Result<()> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level '{level}'"))?,
    };
    let console: BoxedLayer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let mut layers = vec![console];
    if let Some(path) = logging.file.as_deref() {
        layers.push(file_layer(path, logging)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("failed to install tracing subscriber: {e}"))
}

fn rotation(name: Option<&str>) -> Rotation {
    match name {
        Some("daily") => Rotation::DAILY,
        Some("hourly") => Rotation::HOURLY,
        _ => Rotation::NEVER,
    }
}

fn file_layer(path: &str, logging: &welder_config::Logging) -> eyre::Result<BoxedLayer> {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let Some(name) = path.file_name() else {
        eyre::bail!("logging.file has no file name: {}", path.display());
    };
    let appender = RollingFileAppender::builder()
        .rotation(rotation(logging.rotation.as_deref()))
        .filename_prefix(name.to_string_lossy().into_owned())
        .build(dir)
        .wrap_err_with(|| format!("open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    let level = logging.level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_new(level).wrap_err("invalid logging.level")?;
    Ok(fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter)
        .boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_rotation_never_rotates() {
        assert_eq!(rotation(None), Rotation::NEVER);
        assert_eq!(rotation(Some("weekly")), Rotation::NEVER);
        assert_eq!(rotation(Some("hourly")), Rotation::HOURLY);
    }
}
