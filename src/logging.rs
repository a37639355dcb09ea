//! Logging setup: compact human readable lines on the terminal and the same
//! events appended to a log file, so a CI run can be inspected afterwards.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::TryciError;

pub const DEFAULT_LOG_FILE: &str = "./logs/tryci.log";

#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

struct SharedFileGuard<'a> {
    guard: std::sync::MutexGuard<'a, File>,
}

impl std::io::Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut *self.guard, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut *self.guard)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        // a poisoned lock only means another event panicked mid-write
        let guard = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        SharedFileGuard { guard }
    }
}

fn open_log_file(log_file: &Path) -> Result<File, TryciError> {
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(log_file)?)
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// `verbose` flag. Call once, before anything logs.
pub fn init_logging(log_file: &Path, verbose: bool) -> Result<PathBuf, TryciError> {
    let default_filter = if verbose { "tryci=debug" } else { "tryci=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(SharedFileWriter {
            file: Arc::new(Mutex::new(open_log_file(log_file)?)),
        });

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(terminal_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TryciError::RuntimeError(format!("Failed to set up logging: {}", e)))?;

    Ok(log_file.to_path_buf())
}
