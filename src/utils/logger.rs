// Logger initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "s3_rds_connector=info";

/// Installs the global subscriber: `RUST_LOG` filter (falling back to
/// `verbose`-dependent defaults) and a fmt layer on stderr.
pub fn init_logger(verbose: bool) {
    let fallback = if verbose {
        "s3_rds_connector=debug,sqlx=info"
    } else {
        DEFAULT_FILTER
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
