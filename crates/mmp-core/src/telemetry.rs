//! Tracing subscriber setup for hosts embedding the engine

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted before the fallback filter
pub const LOG_ENV: &str = "MMP_LOG";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Install a global subscriber
///
/// The filter comes from `MMP_LOG`, then `RUST_LOG`, then `fallback`.
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(fallback: &str, format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false))
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_reports_false() {
        let _ = init_tracing("mmp_core=debug", LogFormat::Compact);
        assert!(!init_tracing("mmp_core=debug", LogFormat::Json));
    }
}
