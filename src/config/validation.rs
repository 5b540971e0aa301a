//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, the upstream URL and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::uri::{Scheme, Uri};

use crate::config::schema::RelayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),
    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,
    #[error("upstream.url '{0}' is not a valid URL")]
    UpstreamUrl(String),
    #[error("upstream.url '{0}' must use the http scheme")]
    UpstreamScheme(String),
    #[error("upstream.url '{0}' has no host")]
    UpstreamHost(String),
    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
    #[error("lifecycle.shutdown_timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    if let Err(e) = validate_upstream_url(&config.upstream.url) {
        errors.push(e);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.lifecycle.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_upstream_url(url: &str) -> Result<Uri, ValidationError> {
    let uri: Uri = url
        .parse()
        .map_err(|_| ValidationError::UpstreamUrl(url.to_string()))?;

    // TLS is not supported on the upstream leg.
    if uri.scheme() != Some(&Scheme::HTTP) {
        return Err(ValidationError::UpstreamScheme(url.to_string()));
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(ValidationError::UpstreamHost(url.to_string()));
    }

    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "localhost".into();
        config.listener.max_connections = 0;
        config.upstream.url = "https://example.com".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".into();
        config.lifecycle.shutdown_timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("localhost".into()),
                ValidationError::ZeroConnections,
                ValidationError::UpstreamScheme("https://example.com".into()),
                ValidationError::MetricsAddress("nowhere".into()),
                ValidationError::ZeroShutdownTimeout,
            ]
        );
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = RelayConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn upstream_url_must_be_absolute() {
        assert!(matches!(
            validate_upstream_url("/relative/path"),
            Err(ValidationError::UpstreamScheme(_))
        ));
        assert!(matches!(
            validate_upstream_url("not a url"),
            Err(ValidationError::UpstreamUrl(_))
        ));
        assert!(validate_upstream_url("http://127.0.0.1:3111/data").is_ok());
    }
}
