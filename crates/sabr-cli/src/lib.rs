// Library root for the command-line driver: config, CSV loading and command
// dispatch, exposed so integration tests can drive commands directly.

pub mod commands;
pub mod config;
pub mod loader;
