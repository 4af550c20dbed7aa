// src/config/mod.rs
//! Runtime configuration: credentials from the environment and the source
//! catalog from `<output_dir>/sources.toml`.

pub mod catalog;
pub mod env;

pub use catalog::{load_catalog, Catalog, CATALOG_FILE};
pub use env::{EmailConfig, MonitorEnv};
