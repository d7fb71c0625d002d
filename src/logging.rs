//! File logging. The TUI owns the terminal, so nothing is written to
//! stdout or stderr; events go to a daily-rolling file in the data directory.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured level
pub const LOG_ENV: &str = "PHITODO_LOG";

const LOG_FILE_PREFIX: &str = "phitodo.log";

/// Filter directive: `PHITODO_LOG` wins, then the config level, then `info`
pub fn filter_directive(config_level: &str, env_override: Option<&str>) -> String {
    let level = env_override
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config_level.trim());
    if level.is_empty() {
        "phitodo=info".to_string()
    } else if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("phitodo={}", level)
    }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// life of the process; dropping it flushes buffered lines.
pub fn init(log_dir: &Path, config_level: &str) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_level = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(config_level, env_level.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("phitodo=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("debug", None), "phitodo=debug");
        assert_eq!(filter_directive("debug", Some("trace")), "phitodo=trace");
        assert_eq!(filter_directive("info", Some("  ")), "phitodo=info");
        assert_eq!(filter_directive("", None), "phitodo=info");
        assert_eq!(
            filter_directive("phitodo=debug,rusqlite=warn", None),
            "phitodo=debug,rusqlite=warn"
        );
    }
}
