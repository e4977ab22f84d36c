//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: config struct definitions, loading and environment overrides
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup checks

mod defaults;
mod types;
mod validation;

pub use types::{
    ApiConfig, Config, ConfigError, DatabaseConfig, DeliveryConfig, LogConfig, MetricsConfig,
    PlatformConfig, ReconcileConfig, ReplicaConfig, WriterConfig,
};
pub use validation::ValidationError;
