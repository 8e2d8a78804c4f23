#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use bones::config::{ConfigFile, PolicySection, RawConfigFile};
use bones::exec::{ProcessBackend, ProcessRequest, ProcessTable, RequestFlags};
use bones::relay::{Relay, RelayOptions};
use bones::types::DisconnectPolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_policy(mut self, name: &str, policy: PolicySection) -> Self {
        self.config.classifier.insert(name.to_string(), policy);
        self
    }

    pub fn with_project_dir(mut self, dir: &Path) -> Self {
        self.config.installer.project_dir = dir.to_path_buf();
        self
    }

    pub fn with_installer(mut self, program: &str, args: &[&str]) -> Self {
        self.config.installer.program = program.to_string();
        self.config.installer.args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_buffer_events(mut self, n: usize) -> Self {
        self.config.relay.buffer_events = n;
        self
    }

    pub fn with_on_disconnect(mut self, policy: DisconnectPolicy) -> Self {
        self.config.relay.on_disconnect = policy;
        self
    }

    pub fn with_keep_alive_secs(mut self, secs: u64) -> Self {
        self.config.server.keep_alive_secs = secs;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build config")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A `[classifier.<name>]` section.
pub fn policy_section(sentinel: Option<i32>, keywords: &[&str], benign: &[&str]) -> PolicySection {
    PolicySection {
        overwrite_sentinel: sentinel,
        failure_keywords: keywords.iter().map(|s| s.to_string()).collect(),
        benign: benign.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn request(program: &str, args: &[&str]) -> ProcessRequest {
    ProcessRequest::new(program, args.iter().copied(), ".")
}

pub fn request_in(program: &str, args: &[&str], cwd: &Path) -> ProcessRequest {
    ProcessRequest::new(program, args.iter().copied(), cwd)
}

pub fn overwrite_request(program: &str, args: &[&str]) -> ProcessRequest {
    request(program, args).with_flags(RequestFlags {
        overwrite: true,
        shell: false,
    })
}

pub fn relay_with(backend: Arc<dyn ProcessBackend>, options: RelayOptions) -> Relay {
    Relay::new(backend, ProcessTable::new(), options)
}
