//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("replica.name must end with -<index>, got '{0}'")]
    InvalidReplicaName(String),
    #[error("replica.range must be at least 1")]
    InvalidReplicaRange,
    #[error("{0}.url must be an http(s) URL, got '{1}'")]
    InvalidUrl(&'static str, String),
    #[error("delivery.writer_cache_size must be at least 1")]
    InvalidWriterCacheSize,
    #[error("reconcile.list_limit must be at least 1")]
    InvalidListLimit,
    #[error("reconcile.interval_secs must be at least 1")]
    InvalidReconcileInterval,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.replica.index().is_err() {
        errors.push(ValidationError::InvalidReplicaName(
            config.replica.name.clone(),
        ));
    }
    if config.replica.range == 0 {
        errors.push(ValidationError::InvalidReplicaRange);
    }

    if !is_http_url(&config.platform.url) {
        errors.push(ValidationError::InvalidUrl(
            "platform",
            config.platform.url.clone(),
        ));
    }
    if !is_http_url(&config.writer.url) {
        errors.push(ValidationError::InvalidUrl(
            "writer",
            config.writer.url.clone(),
        ));
    }

    if config.delivery.writer_cache_size == 0 {
        errors.push(ValidationError::InvalidWriterCacheSize);
    }
    if config.reconcile.list_limit == 0 {
        errors.push(ValidationError::InvalidListLimit);
    }
    if config.reconcile.interval_secs == 0 {
        errors.push(ValidationError::InvalidReconcileInterval);
    }

    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(
                config.database.path.clone(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
