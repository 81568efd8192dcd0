//! Process-wide tracing setup shared by binaries and test harnesses.

/// Install the JSON subscriber for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

pub use self::tracing::{DEFAULT_DIRECTIVE, env_filter, init_for_tests};

/// Subscriber configuration (filters, formatting).
pub mod tracing;
