//! Logger: the single diagnostic sink shared by the scanner, compiler and VM.
//!
//! Mirrors the original `Logger`/`LOG`/`INFO`/`WARN`/`SYNTAXERROR`/`RUNTIMEERROR`/
//! `TYPEERROR`/`PANIC` macro family: one object owns the current source name and the
//! last-reported snippet, and every diagnostic funnels through `log()`.

use crate::position::Position;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    SyntaxError,
    RuntimeError,
    TypeError,
    Panic,
}

impl LogLevel {
    fn kind_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::SyntaxError => "syntax error",
            LogLevel::RuntimeError => "runtime error",
            LogLevel::TypeError => "type error",
            LogLevel::Panic => "PANIC!",
        }
    }

    /// Whether this level aborts the process outright when not recoverable.
    fn is_fatal_class(self) -> bool {
        matches!(
            self,
            LogLevel::SyntaxError | LogLevel::RuntimeError | LogLevel::TypeError | LogLevel::Panic
        )
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind_str())
    }
}

/// A single emitted diagnostic, for callers running in recoverable mode who want to
/// inspect what went wrong instead of letting the process exit.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: LogLevel,
    pub message: String,
    pub position: Position,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.position.is_unknown() {
            write!(f, "{}: {}", self.level, self.message)
        } else {
            write!(
                f,
                "{}:{}:{}: {}: {}",
                self.level, self.position.line, self.position.column, self.level, self.message
            )
        }
    }
}

/// `Ok`/`Failure` outcome of a diagnostic-bearing operation, matching the original's
/// two-valued `Status` enum used in place of exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Failure,
}

pub struct Logger {
    source: String,
    recoverable: bool,
    last: Option<Diagnostic>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        Logger { source: String::from("<unknown>"), recoverable: false, last: None }
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn set_recoverable(&mut self, recoverable: bool) {
        self.recoverable = recoverable;
    }

    pub fn recoverable(&self) -> bool {
        self.recoverable
    }

    pub fn last(&self) -> Option<&Diagnostic> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.source = String::from("<unknown>");
        self.last = None;
    }

    /// Emits `message` at `level`/`position` and returns the resulting `Status`.
    ///
    /// `Info` and `Warning` always return `Ok`. `SyntaxError`/`RuntimeError`/`TypeError`
    /// return `Failure` in recoverable mode, otherwise terminate the process.
    /// `Panic` always terminates.
    pub fn log(&mut self, level: LogLevel, position: Position, message: impl Into<String>) -> Status {
        let message = message.into();
        let line = self.format_line(level, position, &message);

        if level == LogLevel::Info {
            println!("{line}");
        } else {
            eprintln!("{line}");
        }

        self.last = Some(Diagnostic { level, message, position });

        if level == LogLevel::Panic {
            std::process::abort();
        }

        if level.is_fatal_class() {
            if self.recoverable {
                return Status::Failure;
            }
            std::process::exit(-1);
        }

        Status::Ok
    }

    fn format_line(&self, level: LogLevel, position: Position, message: &str) -> String {
        if position.is_unknown() {
            format!("{}: {}", level, message)
        } else {
            format!(
                "{}:{}:{}: {}: {}",
                self.source, position.line, position.column, level, message
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_do_not_exit() {
        let mut log = Logger::new();
        log.set_recoverable(true);
        let status = log.log(LogLevel::SyntaxError, Position::unknown(), "bad token");
        assert_eq!(status, Status::Failure);
        assert_eq!(log.last().unwrap().level, LogLevel::SyntaxError);
    }

    #[test]
    fn info_never_fails() {
        let mut log = Logger::new();
        let status = log.log(LogLevel::Info, Position::unknown(), "hello");
        assert_eq!(status, Status::Ok);
    }
}
