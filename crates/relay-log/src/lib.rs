//! Logging initialization.
//!
//! One call, `init`/`init_from_env`, wires `tracing` up to a
//! `tracing-subscriber` fmt layer driven by an `EnvFilter`. Every engine
//! component instruments its own spans and events against `tracing`
//! directly; this crate only owns process-wide subscriber setup.

mod config;

pub use config::{Config, Format};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global `tracing` subscriber. Idempotent: a second call is a
/// no-op rather than a panic, since tests commonly call it per-module.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        Format::Compact => registry
            .with(fmt::layer().with_ansi(config.ansi).compact())
            .try_init(),
        Format::Pretty => registry
            .with(fmt::layer().with_ansi(config.ansi).pretty())
            .try_init(),
        Format::Json => registry.with(fmt::layer().json()).try_init(),
    };

    if let Err(err) = result {
        tracing::trace!(%err, "tracing subscriber already initialized");
    }
}

/// Convenience wrapper over [`Config::from_env`] + [`init`].
pub fn init_from_env() {
    init(&Config::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_does_not_panic_on_repeat_calls() {
        init(&Config::test());
        init(&Config::test());
    }
}
