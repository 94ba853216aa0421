//! Test logging

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Route tracing output through the test harness's captured writer.
///
/// Honors `RUST_LOG`, defaulting to `info`. Safe to call from every test;
/// only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .with_test_writer()
        .try_init();
}
