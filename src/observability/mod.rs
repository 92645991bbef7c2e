//! Logging setup.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the embedding application. With the `subscriber` feature (on by
//! default) [`init_tracing`] installs one from a [`LoggingConfig`](crate::config::LoggingConfig).

#[cfg(feature = "subscriber")]
mod tracing_init;

#[cfg(feature = "subscriber")]
pub use tracing_init::*;
