//! Process-wide tracing setup: an `EnvFilter` sourced from `RUST_LOG`
//! (defaulting to `info`) feeding a plain `fmt` layer.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
