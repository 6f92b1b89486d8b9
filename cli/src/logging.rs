use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSettings;

/// Level used when `RUST_LOG` is unset.
fn default_level(settings: &LoggingSettings, verbose: bool) -> &str {
    if verbose { "debug" } else { &settings.level }
}

/// Install a stderr subscriber so log lines never mix with command output on stdout.
pub fn init(settings: &LoggingSettings, verbose: bool) {
    let level = default_level(settings, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
