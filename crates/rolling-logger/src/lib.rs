//! Rolling Logger
//!
//! Daily log files plus an in-memory circular buffer of the most recent lines.
//! `log` records are forwarded into tracing, so crates can keep using the
//! `log` macros while the subscriber here decides where lines end up.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use chrono::Local;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{self, time::FormatTime, MakeWriter};
use tracing_subscriber::prelude::*;

/// Lines kept in memory when no explicit capacity is given
pub const DEFAULT_BUFFER_LINES: usize = 500;
/// Days of log files kept on disk
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("failed to prepare log directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create log appender: {0}")]
    Appender(#[from] InitError),
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("logger not initialized")]
    NotInitialized,
}

/// Settings for [`init_with`]
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub dir: PathBuf,
    pub app_name: String,
    pub retention_days: u32,
    pub buffer_lines: usize,
    pub level: LevelFilter,
    /// Mirror lines to stderr as well
    pub stderr: bool,
}

impl LoggerConfig {
    pub fn new(dir: impl Into<PathBuf>, app_name: &str) -> Self {
        Self {
            dir: dir.into(),
            app_name: app_name.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            buffer_lines: DEFAULT_BUFFER_LINES,
            level: if cfg!(debug_assertions) { LevelFilter::DEBUG } else { LevelFilter::INFO },
            stderr: cfg!(debug_assertions),
        }
    }
}

/// Bounded buffer of the latest formatted lines
pub struct RecentLines {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl RecentLines {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, bytes: &[u8]) {
        let mut lines = self.lock();
        for line in String::from_utf8_lossy(bytes).lines().filter(|l| !l.is_empty()) {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.to_string());
        }
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `MakeWriter` feeding the ring buffer; teed next to the file writer
#[derive(Clone)]
struct RecentHandle(Arc<RecentLines>);

impl Write for RecentHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.push(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RecentHandle {
    type Writer = RecentHandle;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Daily `{app}.{YYYY-MM-DD}.log` files, keeping `retention_days` of them
///
/// Lines are written by a background worker; they reach disk once the
/// returned guard is dropped or the worker catches up.
pub fn file_writer(config: &LoggerConfig) -> Result<(NonBlocking, WorkerGuard), LoggerError> {
    fs::create_dir_all(&config.dir).map_err(|source| LoggerError::Io {
        path: config.dir.clone(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(config.app_name.as_str())
        .filename_suffix("log")
        .max_log_files(config.retention_days.max(1) as usize)
        .build(&config.dir)?;

    Ok(tracing_appender::non_blocking(appender))
}

struct Logger {
    recent: Arc<RecentLines>,
    guard: Mutex<Option<WorkerGuard>>,
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Initialize the global logger with default settings
pub fn init_logger(dir: impl Into<PathBuf>, app_name: &str) -> Result<(), LoggerError> {
    init_with(LoggerConfig::new(dir, app_name))
}

/// Initialize the global logger
pub fn init_with(config: LoggerConfig) -> Result<(), LoggerError> {
    if LOGGER.get().is_some() {
        return Err(LoggerError::AlreadyInitialized);
    }
    let (file, guard) = file_writer(&config)?;
    let recent = Arc::new(RecentLines::new(config.buffer_lines));

    let file_layer = fmt::layer()
        .with_timer(LocalTimer)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_writer(file.and(RecentHandle(recent.clone())));

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_timer(LocalTimer)
            .with_target(true)
            .with_writer(io::stderr)
    });

    tracing_subscriber::registry()
        .with(config.level)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    LOGGER
        .set(Logger {
            recent,
            guard: Mutex::new(Some(guard)),
        })
        .map_err(|_| LoggerError::AlreadyInitialized)?;
    log::info!("logger initialized for {} in {}", config.app_name, config.dir.display());
    Ok(())
}

/// Flush pending lines to disk; file output stops afterwards
pub fn shutdown() {
    if let Some(logger) = LOGGER.get() {
        let guard = logger.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        drop(guard);
    }
}

/// Recent lines from the global logger (empty before initialization)
pub fn recent_lines() -> Vec<String> {
    LOGGER.get().map(|logger| logger.recent.snapshot()).unwrap_or_default()
}

pub fn info(message: &str) -> Result<(), LoggerError> {
    LOGGER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::info!("{}", message);
    Ok(())
}

pub fn error(message: &str) -> Result<(), LoggerError> {
    LOGGER.get().ok_or(LoggerError::NotInitialized)?;
    tracing::error!("{}", message);
    Ok(())
}
