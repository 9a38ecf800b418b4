use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG`, when set, wins over the configured level.
///
/// Events go to stderr so that stdout stays free for results.
pub fn init_logging(level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    // A subscriber may already be installed, e.g. by a test harness.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_initialize_twice() {
        init_logging(Level::WARN);
        init_logging(Level::DEBUG);
        tracing::event!(Level::INFO, "still fine");
    }
}
