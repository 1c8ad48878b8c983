//! tracing setup: a file sink next to the executable, an optional stdout
//! mirror gated by `APP_DEV`, and a runtime-reloadable level filter driven
//! by the `LogLevel` config option.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

use crate::errors::ServiceError;

const LOG_FILE_NAME: &str = "typoscout.log";

static RELOAD_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Shared append-only log file. Cloned per writer; every write locks the
/// underlying handle so lines stay whole.
#[derive(Clone)]
pub struct LogSink {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl LogSink {
    pub fn open() -> Result<Self, ServiceError> {
        let exe = std::env::current_exe()
            .map_err(|e| ServiceError::Config(format!("cannot locate executable: {e}")))?;
        let dir = exe
            .parent()
            .ok_or_else(|| ServiceError::Config("executable has no parent directory".into()))?;
        let path = dir.join(LOG_FILE_NAME);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Truncate the log file in place (admin log reset).
    pub fn reset(&self) -> Result<(), ServiceError> {
        let mut file = self.file.lock().expect("log sink lock poisoned");
        file.set_len(0)?;
        file.rewind()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<u8>, ServiceError> {
        // Read through a fresh handle so the append cursor stays put.
        Ok(std::fs::read(&self.path)?)
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().expect("log sink lock poisoned").write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().expect("log sink lock poisoned").flush()
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn env_filter(level: &str) -> EnvFilter {
    let directive = match level.to_lowercase().as_str() {
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        "off" => "off",
        _ => "info",
    };
    EnvFilter::new(directive)
}

/// Install the global subscriber. `APP_DEV` mirrors log lines to stdout in
/// addition to the file sink.
pub fn init(level: &str) -> Result<LogSink, ServiceError> {
    let sink = LogSink::open()?;

    let (filter, handle) = reload::Layer::new(env_filter(level));

    let stdout_layer = std::env::var("APP_DEV")
        .map(|value| value.to_lowercase() == "true")
        .unwrap_or(false)
        .then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(sink.clone()),
        )
        .with(stdout_layer)
        .init();

    let _ = RELOAD_HANDLE.set(handle);
    Ok(sink)
}

/// Swap the level filter at runtime (admin config update).
pub fn set_level(level: &str) {
    if let Some(handle) = RELOAD_HANDLE.get() {
        if let Err(err) = handle.reload(env_filter(level)) {
            eprintln!("Failed to reload log level: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_the_documented_levels() {
        for level in ["Error", "Warn", "Info", "Debug", "Off", "bogus"] {
            // Construction must not panic for any config value.
            let _ = env_filter(level);
        }
    }
}
