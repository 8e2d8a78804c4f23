// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::classify::PolicySet;
use crate::exec::RunnerOptions;
use crate::relay::RelayOptions;
use crate::types::DisconnectPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// port = 3030
///
/// [relay]
/// buffer_events = 64
/// on_disconnect = "drain"
///
/// [installer]
/// program = "npx"
/// args = ["shadcn@latest", "add"]
///
/// [classifier.installer]
/// overwrite_sentinel = 1
/// failure_keywords = ["already exists"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub relay: RelaySection,

    #[serde(default)]
    pub installer: InstallerSection,

    /// Named classifier policies from `[classifier.<name>]`. These are layered
    /// over the built-in `default` and `installer` policies.
    #[serde(default)]
    pub classifier: BTreeMap<String, PolicySection>,
}

/// Validated configuration. Only constructed via `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub relay: RelaySection,
    pub installer: InstallerSection,
    pub policies: PolicySet,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        server: ServerSection,
        relay: RelaySection,
        installer: InstallerSection,
        policies: PolicySet,
    ) -> Self {
        Self {
            server,
            relay,
            installer,
            policies,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(
            ServerSection::default(),
            RelaySection::default(),
            InstallerSection::default(),
            PolicySet::default(),
        )
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Interval of SSE keep-alive comments; `0` disables them.
    pub keep_alive_secs: u64,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            keep_alive_secs: 15,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl ServerSection {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        (self.keep_alive_secs > 0).then(|| Duration::from_secs(self.keep_alive_secs))
    }
}

/// `[relay]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    /// Bounded per-process event buffer.
    pub buffer_events: usize,
    /// Largest single pipe read.
    pub chunk_bytes: usize,
    /// Per-stream capture cap used for classification (tail is kept).
    pub max_captured_bytes: usize,
    pub on_disconnect: DisconnectPolicy,
    /// Optional cancellation deadline for every run.
    pub timeout_secs: Option<u64>,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            buffer_events: 64,
            chunk_bytes: 8 * 1024,
            max_captured_bytes: 64 * 1024,
            on_disconnect: DisconnectPolicy::Drain,
            timeout_secs: None,
        }
    }
}

impl RelaySection {
    pub fn runner_options(&self) -> RunnerOptions {
        RunnerOptions {
            buffer_events: self.buffer_events,
            chunk_bytes: self.chunk_bytes,
        }
    }

    pub fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            capture_limit: self.max_captured_bytes,
            buffer_events: self.buffer_events,
            on_disconnect: self.on_disconnect,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// `[installer]` section: how the add-component action invokes the tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallerSection {
    pub program: String,
    /// Arguments placed before the component name.
    pub args: Vec<String>,
    pub project_dir: PathBuf,
    /// Project configuration that must exist before installing.
    pub config_file: String,
    /// Where components land, relative to `project_dir`.
    pub component_dir: PathBuf,
    pub component_ext: String,
    pub shell: bool,
    /// Classifier policy name.
    pub policy: String,
}

impl Default for InstallerSection {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["shadcn@latest".to_string(), "add".to_string()],
            project_dir: PathBuf::from("."),
            config_file: "components.json".to_string(),
            component_dir: PathBuf::from("components/ui"),
            component_ext: "tsx".to_string(),
            shell: false,
            policy: crate::classify::policy::INSTALLER_POLICY.to_string(),
        }
    }
}

/// `[classifier.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PolicySection {
    pub overwrite_sentinel: Option<i32>,
    pub failure_keywords: Vec<String>,
    pub benign: Vec<String>,
}
