/// `spec.md` §6: `log(level, message, location)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// The logging sink external collaborators supply (`spec.md` §6). `sheet-engine`
/// ships a reference `StdLogger` built on the `log` crate facade, but the
/// interpreter core only ever depends on this trait.
pub trait Logger {
    fn log(&self, level: LogLevel, message: &str, location: Option<SourceLocation>);

    fn info(&self, message: &str, location: Option<SourceLocation>) {
        self.log(LogLevel::Info, message, location);
    }
    fn warn(&self, message: &str, location: Option<SourceLocation>) {
        self.log(LogLevel::Warn, message, location);
    }
    fn error(&self, message: &str, location: Option<SourceLocation>) {
        self.log(LogLevel::Error, message, location);
    }
}

/// A `Logger` that discards everything; useful in tests that don't care
/// about diagnostic output.
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str, _location: Option<SourceLocation>) {}
}
