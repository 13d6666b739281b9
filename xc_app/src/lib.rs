//! # xc_app
//!
//! Configuration, secrets and logging for binaries built on `xc_http`

pub mod cli;
pub mod config_loader;
pub mod probe;
pub mod secrets;
pub mod tracing_setup;
