//! Tracing and logging setup shared by the echo server binaries and tests.

pub use self::tracing::LogFormat;

/// Initialize process-wide logging in the given output format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_with(format: LogFormat) {
    self::tracing::init(format);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
