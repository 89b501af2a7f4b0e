//! Configuration loading, environment overrides and validation.
//!
//! Config files: `flowrelay.toml`, `flowrelay.yaml`, `flowrelay.yml` or
//! `flowrelay.json`, searched in `./` then the user config dir.
//!
//! Supports `${ENV_VAR}` substitution in the raw file text.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{BackendConfig, FlowrelayConfig, MetricsConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult, check_config, validate},
};
