//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Control Plane / Metrics
// =============================================================================

pub fn default_api_port() -> u16 {
    50051
}

pub fn default_request_timeout_ms() -> u64 {
    30_000
}

pub fn default_metrics_port() -> u16 {
    9090
}

// =============================================================================
// Upstream Endpoints
// =============================================================================

pub fn default_platform_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

pub fn default_platform_timeout_ms() -> u64 {
    10_000
}

pub fn default_poll_timeout_secs() -> u64 {
    30
}

pub fn default_writer_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

pub fn default_writer_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Storage
// =============================================================================

pub fn default_database_path() -> String {
    "chanrelay.db".to_string()
}

/// 90 days.
pub fn default_retention_hours() -> u64 {
    2160
}

// =============================================================================
// Replica
// =============================================================================

pub fn default_replica_name() -> String {
    "chanrelay-0".to_string()
}

pub fn default_replica_range() -> u32 {
    1
}

// =============================================================================
// Delivery
// =============================================================================

pub fn default_writer_cache_size() -> usize {
    1000
}

/// 15 minutes.
pub fn default_writer_ttl_secs() -> u64 {
    900
}

pub fn default_retry_initial_ms() -> u64 {
    100
}

pub fn default_retry_max_elapsed_ms() -> u64 {
    10_000
}

// =============================================================================
// Reconciliation
// =============================================================================

pub fn default_reconcile_interval_secs() -> u64 {
    900
}

pub fn default_list_limit() -> u32 {
    1000
}

// =============================================================================
// Logging
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}
