use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer,
    filter::{Directive, EnvFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize tracing with a default directive such as `info` or
/// `certwatch_service=debug`. `RUST_LOG` still takes precedence.
///
/// An unparsable directive falls back to `info`.
pub fn init_with_directive(directive: &str) {
    initialize_tracing(default_directive(directive));
}

fn default_directive(raw: &str) -> Directive {
    raw.parse().unwrap_or_else(|_| LevelFilter::INFO.into())
}

/// Initialize tracing subscriber with default configuration.
fn initialize_tracing(default: Directive) {
    let env_filter = EnvFilter::builder().with_default_directive(default).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT")
        .inspect_err(|error| {
            warn!("Failed to read RUST_LOG_FORMAT, falling back to default: {error}")
        })
        .unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed(),
    };

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}
