use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

pub const DEFAULT_FILTER: &str = "company_sync=info";

/// Sets up the global tracing subscriber with a fmt formatter and env filter.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Both binaries
/// go through here so they share the same output format.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
