//! Logger bootstrap for binaries and long-running hosts
//!
//! `RUST_LOG` wins when set; otherwise `default_level` applies to every
//! module. Safe to call more than once.

use env_logger::{Builder, Env};

pub fn init() {
    init_with_level("info");
}

pub fn init_with_level(default_level: &str) {
    let result = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
    if result.is_err() {
        log::debug!("[Logging] logger already initialized");
    }
}
