// src/server/state.rs

use std::sync::Arc;
use std::time::Duration;

use crate::classify::{ClassifierPolicy, PolicySet};
use crate::config::ConfigFile;
use crate::exec::{ProcessBackend, ProcessTable};
use crate::fs::FileSystem;
use crate::install::ComponentInstaller;
use crate::relay::Relay;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or already `Clone`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub relay: Relay,
    pub installer: Arc<ComponentInstaller>,
    /// Policies selectable by name from the streaming endpoint.
    pub policies: Arc<PolicySet>,
    /// SSE keep-alive interval; `None` disables keep-alive comments.
    pub keep_alive: Option<Duration>,
}

impl AppState {
    pub fn from_config(
        cfg: &ConfigFile,
        backend: Arc<dyn ProcessBackend>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let relay = Relay::new(backend, ProcessTable::new(), cfg.relay.relay_options());
        let installer_policy = cfg
            .policies
            .get(&cfg.installer.policy)
            .cloned()
            .unwrap_or_else(ClassifierPolicy::installer);
        let installer = ComponentInstaller::new(
            fs,
            relay.clone(),
            cfg.installer.clone(),
            installer_policy,
        );

        Self {
            relay,
            installer: Arc::new(installer),
            policies: Arc::new(cfg.policies.clone()),
            keep_alive: cfg.server.keep_alive(),
        }
    }
}
