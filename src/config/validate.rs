// src/config/validate.rs

use crate::classify::{ClassifierPolicy, KeywordRule, PolicySet};
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BonesError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BonesError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        let policies = build_policies(&raw);
        Ok(ConfigFile::new_unchecked(
            raw.server,
            raw.relay,
            raw.installer,
            policies,
        ))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_relay(cfg)?;
    validate_installer(cfg)?;
    validate_policies(cfg)?;
    Ok(())
}

fn validate_relay(cfg: &RawConfigFile) -> Result<()> {
    let relay = &cfg.relay;
    if relay.buffer_events == 0 {
        return Err(BonesError::ConfigError(
            "[relay].buffer_events must be >= 1 (got 0)".to_string(),
        ));
    }
    if relay.chunk_bytes == 0 {
        return Err(BonesError::ConfigError(
            "[relay].chunk_bytes must be >= 1 (got 0)".to_string(),
        ));
    }
    if relay.max_captured_bytes == 0 {
        return Err(BonesError::ConfigError(
            "[relay].max_captured_bytes must be >= 1 (got 0)".to_string(),
        ));
    }
    if relay.timeout_secs == Some(0) {
        return Err(BonesError::ConfigError(
            "[relay].timeout_secs must be >= 1 when set".to_string(),
        ));
    }
    Ok(())
}

fn validate_installer(cfg: &RawConfigFile) -> Result<()> {
    let installer = &cfg.installer;
    if installer.program.trim().is_empty() {
        return Err(BonesError::ConfigError(
            "[installer].program must not be empty".to_string(),
        ));
    }
    if installer.config_file.trim().is_empty() {
        return Err(BonesError::ConfigError(
            "[installer].config_file must not be empty".to_string(),
        ));
    }

    let known = PolicySet::default().contains(&installer.policy)
        || cfg.classifier.contains_key(&installer.policy);
    if !known {
        return Err(BonesError::ConfigError(format!(
            "[installer].policy refers to unknown classifier policy '{}'",
            installer.policy
        )));
    }
    Ok(())
}

fn validate_policies(cfg: &RawConfigFile) -> Result<()> {
    for (name, policy) in cfg.classifier.iter() {
        if name.trim().is_empty() {
            return Err(BonesError::ConfigError(
                "classifier policy names must not be empty".to_string(),
            ));
        }
        let blank = policy
            .failure_keywords
            .iter()
            .chain(policy.benign.iter())
            .any(|k| k.trim().is_empty());
        if blank {
            return Err(BonesError::ConfigError(format!(
                "[classifier.{name}] keywords and benign phrases must not be empty strings"
            )));
        }
    }
    Ok(())
}

fn build_policies(cfg: &RawConfigFile) -> PolicySet {
    let mut set = PolicySet::default();
    for (name, section) in cfg.classifier.iter() {
        let policy = ClassifierPolicy {
            overwrite_sentinel: section.overwrite_sentinel,
            keywords: KeywordRule::new(&section.failure_keywords, &section.benign),
        };
        set.insert(name.clone(), policy);
    }
    set
}
