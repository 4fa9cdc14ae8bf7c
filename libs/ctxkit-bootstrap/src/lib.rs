//! Host bootstrap: layered configuration, logging setup and shutdown signals.

pub mod config;
pub mod config_provider;
pub mod logging;
pub mod paths;
pub mod signals;

pub use config::*;
pub use config_provider::*;
pub use logging::*;
pub use signals::*;

// Tests that read or write process environment variables hold this.
#[cfg(test)]
pub(crate) static TEST_ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
