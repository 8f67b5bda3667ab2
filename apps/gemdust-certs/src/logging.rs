use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

/// Installs the stderr subscriber. Without `-v` the level comes from `RUST_LOG`.
pub fn log_init(verbose: u8) {
    let log_level = match verbose {
        0 => None,
        1 => Some(LevelFilter::INFO),
        2 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    };

    let builder = SubscriberBuilder::default().with_writer(std::io::stderr);
    let installed = match log_level {
        Some(log_level) => builder.with_max_level(log_level).try_init(),
        None => builder
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    if let Err(error) = installed {
        eprintln!("gemdust-certs: logging disabled: {error}");
    }
}
