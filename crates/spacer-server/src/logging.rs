//! Tracing subscriber setup.

use spacer_router::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Chatty dependencies held at `warn` unless `RUST_LOG` says otherwise.
const NOISY_TARGETS: &[(&str, &str)] = &[("hyper", "warn"), ("reqwest", "warn"), ("h2", "warn")];

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = std::iter::once(level.to_string())
            .chain(NOISY_TARGETS.iter().map(|(t, l)| format!("{t}={l}")))
            .collect();
        EnvFilter::new(directives.join(","))
    })
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init(config: &LoggingConfig) {
    let filter = build_env_filter(&config.level);
    match config.format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_target(true)
            .with_env_filter(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_current_span(false)
            .with_env_filter(filter)
            .init(),
    }
}
