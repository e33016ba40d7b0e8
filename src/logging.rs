use tracing_subscriber::EnvFilter;

/// Logs go to stderr so command output on stdout stays pipeable. Level comes
/// from `RUST_LOG`, `warn` if unset.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
