//! Logging and tracing facilities for Sieve.
//!
//! This module provides:
//! - Target names for filtering Sieve's `tracing` output per subsystem
//! - Performance tracing hooks for profiling expensive passes
//! - Thin logging macros with consistent target naming
//!
//! # Tracing Integration
//!
//! Sieve uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! use tracing_subscriber::EnvFilter;
//!
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter(EnvFilter::new("sieve::proxy=debug"))
//!         .init();
//! }
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core target.
    pub const CORE: &str = "sieve_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "sieve_core::signal";
    /// Source model implementations.
    pub const MODEL: &str = "sieve::model";
    /// Proxy change propagation.
    pub const PROXY: &str = "sieve::proxy";
    /// Mapping cache creation and teardown.
    pub const MAPPING: &str = "sieve::proxy::mapping";
    /// Filter evaluation.
    pub const FILTER: &str = "sieve::proxy::filter";
    /// Sorting.
    pub const SORT: &str = "sieve::proxy::sort";
    /// Performance spans.
    pub const PERF: &str = "sieve::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "sieve::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Macros for common tracing patterns.
///
/// These are just wrappers around the `tracing` crate macros with consistent
/// target naming.
#[macro_export]
macro_rules! sieve_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "sieve_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! sieve_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "sieve_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! sieve_info {
    ($($arg:tt)*) => {
        tracing::info!(target: "sieve_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! sieve_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "sieve_core", $($arg)*)
    };
}

#[macro_export]
macro_rules! sieve_error {
    ($($arg:tt)*) => {
        tracing::error!(target: "sieve_core", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span() {
        // Just ensure it compiles and doesn't panic without a subscriber
        let _span = PerfSpan::new("test_operation");
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::MODEL, targets::PROXY, targets::MAPPING, targets::FILTER, targets::SORT] {
            assert!(target.starts_with("sieve::"));
        }
        assert!(targets::SIGNAL.starts_with(targets::CORE));
    }

    #[test]
    fn test_macros_expand() {
        crate::sieve_trace!(value = 1, "trace");
        crate::sieve_debug!("debug");
        crate::sieve_info!("info");
        crate::sieve_warn!("warn");
        crate::sieve_error!("error");
    }
}
