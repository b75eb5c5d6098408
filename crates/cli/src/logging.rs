use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Logging goes to stderr so a wrapped command's stdout stays clean.
///
/// Silent mode raises the default filter to errors only — informational
/// progress disappears but error lines are always emitted. An explicit
/// RUST_LOG still wins over both.
pub fn init_logging(verbose: u8, silent: bool) {
    let default_level = if silent {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .init();
}
