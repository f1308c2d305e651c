//! Logging
//!
//! The library emits records through the [`log`] facade. This module provides
//! a [`Logger`] that implements [`log::Log`] and fans formatted records out to
//! any number of [`LogStream`]s (stdout, stderr, a file, or memory), for front
//! ends that do not bring their own logger.

use std::sync::{Arc, Mutex, OnceLock};

use crate::error::{Error, Result};

pub use log::LevelFilter as LogLevel;

/// Trait for custom log stream implementations
pub trait LogStream: Send + Sync {
    /// Write a log message
    fn write(&mut self, message: &str);
}

/// A log stream that writes to stdout
pub struct StdoutLogStream;

impl LogStream for StdoutLogStream {
    fn write(&mut self, message: &str) {
        println!("{message}");
    }
}

/// A log stream that writes to stderr
pub struct StderrLogStream;

impl LogStream for StderrLogStream {
    fn write(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// A log stream that writes to a file
pub struct FileLogStream {
    file: std::fs::File,
}

impl FileLogStream {
    /// Create a new file log stream
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::scene(format!("cannot open log file: {e}")))?;

        writeln!(file, "=== febex log started ===")
            .map_err(|e| Error::scene(format!("cannot write log file: {e}")))?;

        Ok(Self { file })
    }
}

impl LogStream for FileLogStream {
    fn write(&mut self, message: &str) {
        use std::io::Write;
        let _ = writeln!(self.file, "{message}");
        let _ = self.file.flush();
    }
}

/// A log stream that collects messages in memory
#[derive(Debug, Default)]
pub struct MemoryLogStream {
    messages: Vec<String>,
}

impl MemoryLogStream {
    /// Create a new memory log stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected messages
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Clear all collected messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl LogStream for MemoryLogStream {
    fn write(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// A logger that forwards records to attached streams
pub struct Logger {
    level: Mutex<LogLevel>,
    streams: Mutex<Vec<Arc<Mutex<dyn LogStream>>>>,
}

impl Logger {
    /// Create a new logger with no streams
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: Mutex::new(level),
            streams: Mutex::new(Vec::new()),
        }
    }

    /// Attach a log stream
    pub fn attach_stream(&self, stream: Arc<Mutex<dyn LogStream>>) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.push(stream);
        }
    }

    /// Detach a log stream
    pub fn detach_stream(&self, stream: &Arc<Mutex<dyn LogStream>>) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.retain(|s| !Arc::ptr_eq(s, stream));
        }
    }

    /// Detach all log streams
    pub fn detach_all_streams(&self) {
        if let Ok(mut streams) = self.streams.lock() {
            streams.clear();
        }
    }

    /// Number of attached streams
    pub fn num_streams(&self) -> usize {
        self.streams.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Change the maximum level that reaches the streams
    pub fn set_level(&self, level: LogLevel) {
        if let Ok(mut current) = self.level.lock() {
            *current = level;
        }
    }

    fn level(&self) -> LogLevel {
        self.level.lock().map(|l| *l).unwrap_or(LogLevel::Off)
    }

    fn write_all(&self, message: &str) {
        let Ok(streams) = self.streams.lock() else {
            return;
        };
        for stream in streams.iter() {
            if let Ok(mut stream) = stream.lock() {
                stream.write(message);
            }
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.write_all(&format!(
            "[{:<5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Get the global logger instance
pub fn global_logger() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(|| Logger::new(LogLevel::Info))
}

/// Install the global logger as the `log` backend
///
/// Fails if another logger has already been installed.
pub fn init(level: LogLevel) -> Result<()> {
    let logger = global_logger();
    logger.set_level(level);
    log::set_logger(logger).map_err(|e| Error::scene(e.to_string()))?;
    log::set_max_level(level);
    Ok(())
}

/// Convenience function to attach a stdout log stream
pub fn attach_stdout_stream() {
    global_logger().attach_stream(Arc::new(Mutex::new(StdoutLogStream)));
}

/// Convenience function to attach a stderr log stream
pub fn attach_stderr_stream() {
    global_logger().attach_stream(Arc::new(Mutex::new(StderrLogStream)));
}

/// Convenience function to attach a file log stream
pub fn attach_file_stream<P: AsRef<std::path::Path>>(path: P) -> Result<()> {
    let stream = Arc::new(Mutex::new(FileLogStream::new(path)?));
    global_logger().attach_stream(stream);
    Ok(())
}

/// Convenience function to detach all log streams
pub fn detach_all_streams() {
    global_logger().detach_all_streams();
}
