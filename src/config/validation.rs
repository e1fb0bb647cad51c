//! Configuration validation.
//!
//! Serde handles syntax; this pass checks value ranges and URL shapes and
//! returns every problem found, not just the first.

use std::fmt;
use url::Url;

use crate::config::schema::EngineConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_url(field: &'static str, value: &str, schemes: &[&str], errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let rpc = &config.rpc;
    let submission = &config.submission;

    if rpc.rpc_url.is_empty() {
        errors.push(ValidationError::new("rpc.rpc_url", "must not be empty"));
    } else {
        check_url("rpc.rpc_url", &rpc.rpc_url, &["http", "https"], &mut errors);
    }
    for url in &rpc.failover_urls {
        check_url("rpc.failover_urls", url, &["http", "https"], &mut errors);
    }
    if let Some(ws) = &rpc.ws_url {
        check_url("rpc.ws_url", ws, &["ws", "wss"], &mut errors);
    }
    if rpc.request_timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.request_timeout_secs", "must be greater than 0"));
    }

    if submission.confirm_timeout_ms == 0 {
        errors.push(ValidationError::new("submission.confirm_timeout_ms", "must be greater than 0"));
    }
    if submission.resend_interval_ms == 0 {
        errors.push(ValidationError::new("submission.resend_interval_ms", "must be greater than 0"));
    } else if submission.resend_interval_ms >= submission.confirm_timeout_ms {
        errors.push(ValidationError::new(
            "submission.resend_interval_ms",
            "must be shorter than confirm_timeout_ms",
        ));
    }
    if submission.poll_interval_ms == 0 {
        errors.push(ValidationError::new("submission.poll_interval_ms", "must be greater than 0"));
    } else if submission.poll_interval_ms >= submission.confirm_timeout_ms {
        errors.push(ValidationError::new(
            "submission.poll_interval_ms",
            "must be shorter than confirm_timeout_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = EngineConfig::default();
        config.rpc.rpc_url = String::new();
        config.rpc.ws_url = Some("http://wrong-scheme".to_string());
        config.submission.poll_interval_ms = 0;
        config.submission.resend_interval_ms = 120_000;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "rpc.rpc_url",
                "rpc.ws_url",
                "submission.resend_interval_ms",
                "submission.poll_interval_ms",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = EngineConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "observability.metrics_address: must be a socket address");
    }
}
