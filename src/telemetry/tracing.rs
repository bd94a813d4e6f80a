//! Log subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// `RUST_LOG` wins over the configured level when set.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub fn init_telemetry(config: &Config) {
    let registry = tracing_subscriber::registry().with(env_filter(&config.logging.level));

    let result = match config.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = Config::default_for_testing();
        init_telemetry(&config);
        init_telemetry(&config);
    }

    #[test]
    fn test_env_filter_accepts_directive_lists() {
        let _ = env_filter("info,taskboard=debug");
    }
}
