// src/install/mod.rs

//! Component install actions.
//!
//! - [`ComponentInstaller::add`]: the collected-result "add component"
//!   action. Validates the input, runs the preflight checks, builds the
//!   installer command and runs it through the relay in collected mode.
//! - [`ComponentInstaller::write_files`]: writes component files directly
//!   into the project.

pub mod files;

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::classify::{ClassifierPolicy, Outcome, RunFailure};
use crate::config::InstallerSection;
use crate::exec::{ProcessRequest, RequestFlags};
use crate::fs::FileSystem;
use crate::relay::Relay;

pub use files::{FileSpec, InstallFilesInput};

static COMPONENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("component name pattern is valid")
});

/// Input of the add-component action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddComponentInput {
    pub name: String,
    /// Target directory; defaults to the configured component directory.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

impl AddComponentInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            overwrite: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    /// Rejected before any check ran (bad request).
    #[error("invalid component name '{0}': use lowercase letters, digits and dashes")]
    InvalidName(String),

    #[error("invalid path '{0}': must be relative and stay inside the project")]
    UnsafePath(String),

    #[error("Configuration is missing. Please run init to create a {0} file.")]
    MissingConfig(String),

    #[error("Component {0} already exists. Use the overwrite option if you want to replace it.")]
    AlreadyExists(String),

    #[error("{0}")]
    Write(String),
}

impl InstallError {
    /// Whether this is a malformed request rather than a failed action.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, InstallError::InvalidName(_) | InstallError::UnsafePath(_))
    }
}

#[derive(Debug, Clone)]
pub struct ComponentInstaller {
    fs: Arc<dyn FileSystem>,
    relay: Relay,
    settings: InstallerSection,
    policy: ClassifierPolicy,
}

impl ComponentInstaller {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        relay: Relay,
        settings: InstallerSection,
        policy: ClassifierPolicy,
    ) -> Self {
        Self {
            fs,
            relay,
            settings,
            policy,
        }
    }

    pub fn settings(&self) -> &InstallerSection {
        &self.settings
    }

    pub fn project_dir(&self) -> &Path {
        &self.settings.project_dir
    }

    /// Validate the input, run the preflight checks and build the request.
    pub fn plan(&self, input: &AddComponentInput) -> Result<ProcessRequest, InstallError> {
        if !COMPONENT_NAME.is_match(&input.name) {
            return Err(InstallError::InvalidName(input.name.clone()));
        }
        if let Some(path) = &input.path {
            files::ensure_relative(path)?;
        }

        let project = self.project_dir();
        let config_path = project.join(&self.settings.config_file);
        if !self.fs.is_file(&config_path) {
            return Err(InstallError::MissingConfig(self.settings.config_file.clone()));
        }

        let component_dir = match &input.path {
            Some(path) => project.join(path),
            None => project.join(&self.settings.component_dir),
        };
        let component_file = self.component_file(&component_dir, &input.name);
        if self.fs.exists(&component_file) && !input.overwrite {
            return Err(InstallError::AlreadyExists(input.name.clone()));
        }

        Ok(self.build_request(input))
    }

    fn component_file(&self, dir: &Path, name: &str) -> PathBuf {
        if self.settings.component_ext.is_empty() {
            dir.join(name)
        } else {
            dir.join(format!("{name}.{}", self.settings.component_ext))
        }
    }

    /// `PROGRAM ARGS... NAME --yes [--overwrite] [--path PATH]`, run from the
    /// project directory.
    pub fn build_request(&self, input: &AddComponentInput) -> ProcessRequest {
        let mut args = self.settings.args.clone();
        args.push(input.name.clone());
        args.push("--yes".to_string());
        if input.overwrite {
            args.push("--overwrite".to_string());
        }
        if let Some(path) = &input.path {
            args.push("--path".to_string());
            args.push(path.clone());
        }

        ProcessRequest::new(self.settings.program.clone(), args, self.project_dir()).with_flags(
            RequestFlags {
                overwrite: input.overwrite,
                shell: self.settings.shell,
            },
        )
    }

    /// The add-component action. Always resolves to an outcome; only an
    /// invalid input is returned as an error.
    pub async fn add(&self, input: AddComponentInput) -> Result<Outcome, InstallError> {
        let request = match self.plan(&input) {
            Ok(request) => request,
            Err(err) if err.is_invalid_input() => return Err(err),
            Err(err) => {
                warn!(component = %input.name, error = %err, "preflight failed");
                return Ok(Outcome::Failure(RunFailure::Preflight(err.to_string())));
            }
        };

        info!(
            component = %input.name,
            overwrite = input.overwrite,
            cmd = %request.command_line(),
            "adding component"
        );
        Ok(self.relay.collect(request, self.policy.clone()).await)
    }

    /// Write files relative to the project directory.
    pub fn write_files(&self, files: &[FileSpec]) -> Result<usize, InstallError> {
        files::write_all(self.fs.as_ref(), self.project_dir(), files)
    }
}
