//! Logging and tracing setup shared by all services.

mod logging;

pub use logging::init_tracing;
