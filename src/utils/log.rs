//! Structured logging for the schema service.
//!
//! Every event carries the same set of fields (`service`, `process`,
//! `outcome`, `origin`) so log collectors can group them without parsing
//! the message text. The subscriber is a `tracing` registry with an
//! `EnvFilter`, a fmt layer on a non-blocking stdout writer, and the
//! `tracing-error` layer so captured `SpanTrace`s resolve.

use std::str::FromStr;

use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Service name stamped on every structured event.
pub const SERVICE_NAME: &str = "auth-schema";

const DEFAULT_FILTER: &str = "info";

// =============================================================================
// SUBSCRIBER SETUP
// =============================================================================

/// Output format of the fmt layer, selected with `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for collectors.
    #[default]
    Json,
    /// Human readable multi-line output for local work.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl LogFormat {
    /// Reads `LOG_FORMAT`, falling back to JSON when unset or unknown.
    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

/// Installs the global subscriber.
///
/// The returned guard flushes the non-blocking writer when dropped, so it
/// must live until the process exits.
pub fn init(format: LogFormat) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let (writer, guard) = non_blocking(std::io::stdout());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .with_writer(writer)
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false);

            Registry::default()
                .with(filter)
                .with(fmt_layer)
                .with(ErrorLayer::default())
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().with_writer(writer).pretty().with_target(true);

            Registry::default()
                .with(filter)
                .with(fmt_layer)
                .with(ErrorLayer::default())
                .try_init()?;
        }
    }

    Ok(guard)
}

// =============================================================================
// STRUCTURED EVENTS
// =============================================================================

/// Main logging interface.
pub struct Log;

impl Log {
    /// Emits one structured event. Unknown level strings are logged at INFO.
    pub fn event(level: &str, process: &str, message: &str, outcome: &str, origin: &str) {
        macro_rules! emit {
            ($lvl:expr) => {
                tracing::event!(
                    $lvl,
                    service = SERVICE_NAME,
                    process = process,
                    outcome = outcome,
                    origin = origin,
                    "{}",
                    message
                )
            };
        }

        let level = parse_level(level);
        if level == Level::ERROR {
            emit!(Level::ERROR)
        } else if level == Level::WARN {
            emit!(Level::WARN)
        } else if level == Level::DEBUG {
            emit!(Level::DEBUG)
        } else if level == Level::TRACE {
            emit!(Level::TRACE)
        } else {
            emit!(Level::INFO)
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_ascii_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" | "WARNING" => Level::WARN,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => Level::INFO,
    }
}

#[macro_export]
macro_rules! log_debug {
    ($process:expr, $message:expr, $outcome:expr) => {
        $crate::utils::log::Log::event("DEBUG", $process, $message, $outcome, file!())
    };
}

#[macro_export]
macro_rules! log_info {
    ($process:expr, $message:expr, $outcome:expr) => {
        $crate::utils::log::Log::event("INFO", $process, $message, $outcome, file!())
    };
}

#[macro_export]
macro_rules! log_warn {
    ($process:expr, $message:expr, $outcome:expr) => {
        $crate::utils::log::Log::event("WARN", $process, $message, $outcome, file!())
    };
}

#[macro_export]
macro_rules! log_error {
    ($process:expr, $message:expr, $outcome:expr) => {
        $crate::utils::log::Log::event("ERROR", $process, $message, $outcome, file!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" Pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_level_defaults_to_info() {
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("Warning"), Level::WARN);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_macros_emit_without_subscriber() {
        // No global subscriber is installed in unit tests; events are dropped.
        crate::log_debug!("Test", "debug event", "ok");
        crate::log_info!("Test", "info event", "ok");
        crate::log_warn!("Test", "warn event", "degraded");
        crate::log_error!("Test", "error event", "failed");
    }
}
