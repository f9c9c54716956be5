//! # chronos-telemetry
//!
//! Installs the global `tracing` subscriber: an [`EnvFilter`] seeded from
//! [`LoggingSettings::level`] (`RUST_LOG` wins when set) and a `fmt` layer
//! writing either human-readable lines or JSON to stderr.

#![deny(unsafe_code)]

use chronos_settings::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Build the filter directive string for the configured level.
///
/// Chatty HTTP internals are capped at `warn` unless explicitly raised.
pub fn filter_directives(settings: &LoggingSettings) -> String {
    let level = settings.level.trim().to_lowercase();
    let level = if level.is_empty() { "info" } else { level.as_str() };
    format!("{level},hyper=warn,reqwest=warn,rustls=warn")
}

/// Initialize logging. Call once at startup.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(settings)));

    let fmt_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_use_configured_level() {
        let settings = LoggingSettings {
            level: "DEBUG".into(),
            json: false,
        };
        assert!(filter_directives(&settings).starts_with("debug,"));
    }

    #[test]
    fn empty_level_falls_back_to_info() {
        let settings = LoggingSettings {
            level: "  ".into(),
            json: true,
        };
        assert!(filter_directives(&settings).starts_with("info,"));
    }

    #[test]
    fn second_init_is_rejected() {
        let settings = LoggingSettings::default();
        let _ = init_logging(&settings);
        assert!(!init_logging(&settings));
    }
}
