//! Command-line front end for ETL configuration resolution.
//!
//! The `etl-config` binary resolves a top-level configuration file, merging
//! its local configuration directory, and reports sections, actions, data
//! endpoints or the resolved document. Argument definitions live in [`cli`],
//! command behavior in [`commands`].

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, Commands, ConfigArgs};
