//! Public surface of the relay gateway.
//!
//! Re-exports the building blocks so embedders can assemble the same stack
//! the `relay` binary does.

pub use relay_rs_config as config;
pub use relay_rs_core as core;
pub use relay_rs_protocol as protocol;
pub use relay_rs_provider as provider;
pub use relay_rs_server as server;
pub use relay_rs_tools as tools;

/// Initialize env_logger with `default_level` unless `RUST_LOG` overrides it.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::new()
        .parse_filters(default_level)
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}
