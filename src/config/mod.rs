// src/config/mod.rs

//! Configuration loading and validation for bones.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate sizes, the installer command and classifier policies
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, InstallerSection, PolicySection, RawConfigFile, RelaySection, ServerSection,
};
pub use validate::validate_config;
