//! User-facing run log
//!
//! Distinct from `tracing` diagnostics: every line goes to the console and,
//! with `--capture-logs`, to `logs/runner-output.log` as well.

use colored::Colorize;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO:",
            LogLevel::Success => "SUCCESS:",
            LogLevel::Warn => "WARN:",
            LogLevel::Error => "ERROR:",
        }
    }

    fn colored_prefix(&self) -> String {
        match self {
            LogLevel::Info => self.prefix().blue().to_string(),
            LogLevel::Success => self.prefix().green().to_string(),
            LogLevel::Warn => self.prefix().yellow().to_string(),
            LogLevel::Error => self.prefix().red().bold().to_string(),
        }
    }
}

pub struct RunnerLogger {
    console: Mutex<Box<dyn Write + Send>>,
    colorize: bool,
    file: Mutex<Option<File>>,
    log_path: Option<PathBuf>,
}

impl RunnerLogger {
    /// Console logger on stdout, mirrored to `log_file` when given
    pub fn new(log_file: Option<&Path>) -> Self {
        let colorize = std::io::stdout().is_terminal();
        Self::build(Box::new(std::io::stdout()), colorize, log_file)
    }

    /// Logger with an injected console sink; never colourised
    pub fn with_console(console: Box<dyn Write + Send>, log_file: Option<&Path>) -> Self {
        Self::build(console, false, log_file)
    }

    fn build(console: Box<dyn Write + Send>, colorize: bool, log_file: Option<&Path>) -> Self {
        let file = log_file.and_then(|path| match open_append(path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("Cannot open runner log {}: {}", path.display(), e);
                None
            }
        });

        Self {
            console: Mutex::new(console),
            colorize,
            log_path: file.as_ref().and(log_file.map(Path::to_path_buf)),
            file: Mutex::new(file),
        }
    }

    /// Path of the file sink, if one is attached
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let prefix = if self.colorize { level.colored_prefix() } else { level.prefix().to_string() };
        self.write_console(&format!("{} {}", prefix, message));
        self.write_file(&format!("{} {}", level.prefix(), message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Unprefixed line, e.g. the summary block
    pub fn print(&self, line: &str) {
        self.write_console(line);
        self.write_file(line);
    }

    /// Flush and release the file sink. Later calls are no-ops.
    pub fn close(&self) {
        if let Some(mut file) = self.file.lock().take() {
            if let Err(e) = file.flush() {
                warn!("Failed to flush runner log: {}", e);
            }
        }
        let _ = self.console.lock().flush();
    }

    fn write_console(&self, line: &str) {
        let mut console = self.console.lock();
        let _ = writeln!(console, "{}", line);
    }

    fn write_file(&self, line: &str) {
        if let Some(file) = self.file.lock().as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("Failed to write runner log: {}", e);
            }
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
