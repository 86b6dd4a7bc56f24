//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Install a human-readable fmt subscriber.
///
/// `RUST_LOG` overrides `default_filter`. Returns false if a global subscriber
/// was already installed; calling this more than once is harmless.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Like [`init`], but emits one JSON object per event.
pub fn init_json(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_filter))
        .with_current_span(true)
        .try_init()
        .is_ok()
}
