//! A reference `Logger` built on the `log` crate facade (`spec.md` §6),
//! so an embedder who already wires up `env_logger`/`tracing-log`/etc. gets
//! engine diagnostics for free without implementing the trait themselves.

use sheet_model::logger::{LogLevel, Logger, SourceLocation};

/// Forwards every `Logger` call to the `log` facade under the target
/// `"sheet_engine"`, so host applications can filter engine diagnostics
/// independently of their own.
pub struct StdLogger;

impl Logger for StdLogger {
    fn log(&self, level: LogLevel, message: &str, location: Option<SourceLocation>) {
        let level = match level {
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
            LogLevel::Fatal => log::Level::Error,
        };
        match location {
            Some(loc) => log::log!(target: "sheet_engine", level, "{}:{}: {}", loc.line, loc.column, message),
            None => log::log!(target: "sheet_engine", level, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_maps_to_the_highest_log_level() {
        // log::Level has no Fatal variant; Error is the closest match and
        // still surfaces under default filters.
        let logger = StdLogger;
        logger.log(LogLevel::Fatal, "boom", None);
    }
}
