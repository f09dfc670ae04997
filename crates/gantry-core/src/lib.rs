//! Gantry Core - configuration and errors for the gantry publishing pipeline
//!
//! This crate loads the project configuration file and turns it into the
//! values the pipeline in `gantry-stores` is constructed from.

pub mod config;
pub mod error;

pub use config::{
    find_config, load_config, load_config_from_dir, load_config_or_default, ApiKey, Config,
};
pub use error::{ConfigError, GantryError, Result};
