use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays usable for JSON and CSV output.
/// `RUST_LOG` overrides the default `info` level.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
