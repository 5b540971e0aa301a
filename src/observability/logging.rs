//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick pretty or JSON output
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level when present
//! - JSON format for machine parsing, pretty format for terminals

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter used when `RUST_LOG` is not set.
///
/// `extra_targets` get the same level as the library, so binaries whose
/// crate name differs from `upstream_relay` still see their own events.
pub fn default_filter(level: &str, extra_targets: &[&str]) -> String {
    let mut filter = format!("upstream_relay={level},tower_http={level}");
    for target in extra_targets {
        filter.push_str(&format!(",{target}={level}"));
    }
    filter
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    init_logging_with_targets(config, &[])
}

/// Like [`init_logging`], also enabling `extra_targets` at the configured level.
pub fn init_logging_with_targets(
    config: &ObservabilityConfig,
    extra_targets: &[&str],
) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level, extra_targets)));

    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_crate_and_http_layer() {
        assert_eq!(
            default_filter("debug", &[]),
            "upstream_relay=debug,tower_http=debug"
        );
    }

    #[test]
    fn default_filter_enables_extra_targets() {
        let filter = default_filter("info", &["relay_bench"]);
        assert_eq!(filter, "upstream_relay=info,tower_http=info,relay_bench=info");
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
