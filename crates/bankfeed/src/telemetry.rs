//! Tracing initialization for embedding binaries.
//!
//! The library itself only emits events; hosts call `init()` once at
//! startup. `log` records from dependencies are bridged into tracing.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber with env-filter support
/// (`RUST_LOG=bankfeed=debug,...`). Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        super::init();
        super::init();
    }
}
