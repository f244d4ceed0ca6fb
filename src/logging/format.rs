//! Log setup: human-readable or JSON lines on stderr, so stdout stays free
//! for command output.

use crate::config::LogConfig;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

const FALLBACK_LEVEL: &str = "info";

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber for `config`. `RUST_LOG` wins over the
    /// configured level, and `verbose` raises the configured level to debug.
    pub fn init(config: &LogConfig, verbose: bool) -> Result<(), TryInitError> {
        let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = Self::filter(config, verbose, env.as_deref());

        let json = config.json.then(|| {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_thread_names(true)
                .with_writer(std::io::stderr)
        });
        let plain = (!config.json).then(|| {
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_writer(std::io::stderr)
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(plain)
            .try_init()
    }

    /// First directive set that parses: `env`, then the configured level,
    /// then `info`.
    fn filter(config: &LogConfig, verbose: bool, env: Option<&str>) -> EnvFilter {
        let configured = if verbose { "debug" } else { config.level.as_str() };
        env.into_iter()
            .chain([configured])
            .filter(|d| !d.trim().is_empty())
            .find_map(|d| EnvFilter::try_new(d).ok())
            .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
    }

    /// Write one value as a single JSON line.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(w, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Line<'a> {
        kind: &'a str,
        value: u32,
    }

    fn log(level: &str) -> LogConfig {
        LogConfig {
            level: level.into(),
            json: false,
        }
    }

    #[test]
    fn emits_one_object_per_line() {
        let mut out = Vec::new();
        StructuredLogger::emit_json(&Line { kind: "a", value: 1 }, &mut out).unwrap();
        StructuredLogger::emit_json(&Line { kind: "b", value: 2 }, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec![r#"{"kind":"a","value":1}"#, r#"{"kind":"b","value":2}"#]);
    }

    #[test]
    fn filter_precedence() {
        let f = |config: &LogConfig, verbose, env| StructuredLogger::filter(config, verbose, env).to_string();
        assert_eq!(f(&log("warn"), false, None), "warn");
        assert_eq!(f(&log("warn"), true, None), "debug");
        assert_eq!(f(&log("warn"), true, Some("packet_sentinel=trace")), "packet_sentinel=trace");
        assert_eq!(f(&log("warn"), false, Some("")), "warn");
    }

    #[test]
    fn unparsable_levels_fall_back() {
        let f = |config: &LogConfig, env| StructuredLogger::filter(config, false, env).to_string();
        assert_eq!(f(&log("error"), Some("packet_sentinel=loud")), "error");
        assert_eq!(f(&log("packet_sentinel=loud"), None), "info");
    }
}
