//! Log output for both binaries. Everything goes to stderr; stdout belongs to
//! the JSON reports the CLI prints.

use crate::util::env::env_opt;
use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Line layout, chosen with `LOG_FORMAT` (`full` or `compact`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Target plus source file and line on every event.
    Full,
    /// One short line per event, for terminals and operator runs.
    Compact,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("compact") => Self::Compact,
            _ => Self::Full,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(env_opt("LOG_FORMAT").as_deref())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match LogFormat::from_env() {
        LogFormat::Full => builder.with_file(true).with_line_number(true).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}
