use crate::settings::{Links, Settings};
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use prowlarr::{Connection, Protocol};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "PROWLARR_SYNC_CONFIG";

/// Name of the instance defined at the top level of the file.
pub const DEFAULT_INSTANCE: &str = "default";

/// Get the default config file path
pub fn default_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("prowlarr-sync").join("config.toml"))
}

/// Resolve the config file path: explicit argument, then environment, then
/// the default location. `~` is expanded.
pub fn resolve_path(explicit: Option<&str>) -> Result<PathBuf> {
    let raw = match explicit {
        Some(path) => path.to_string(),
        None => match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => path,
            _ => return default_path(),
        },
    };
    Ok(PathBuf::from(shellexpand::tilde(&raw).as_ref()))
}

// ============================================================================
// Instance
// ============================================================================

/// Connection details and settings of one Prowlarr instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_base: Option<String>,
    /// Discovered from the instance when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Version used to select version-dependent mappings instead of the one
    /// the instance reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub settings: Settings,
}

fn default_hostname() -> String {
    "prowlarr".to_string()
}

fn default_port() -> u16 {
    9696
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            protocol: Protocol::default(),
            url_base: None,
            api_key: None,
            version: None,
            settings: Settings::default(),
        }
    }
}

impl InstanceConfig {
    pub fn connection(&self) -> Connection {
        Connection {
            hostname: self.hostname.clone(),
            port: self.port,
            protocol: self.protocol,
            url_base: self.url_base.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

// ============================================================================
// Links
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkedInstance {
    pub api_key: SecretString,
}

/// API keys of sibling services, keyed by plugin then instance name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct LinkedInstances(IndexMap<String, IndexMap<String, LinkedInstance>>);

impl Links for LinkedInstances {
    fn api_key(&self, plugin: &str, instance: &str) -> Option<SecretString> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(plugin))
            .and_then(|(_, instances)| instances.get(instance))
            .map(|linked| linked.api_key.clone())
    }
}

// ============================================================================
// Config File
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// The single instance, used when `instances` is empty.
    #[serde(flatten)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub instances: IndexMap<String, InstanceConfig>,
    #[serde(default)]
    pub links: LinkedInstances,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every instance's settings, filling in defaults.
    pub fn validate(&mut self) -> Result<()> {
        if self.instances.is_empty() {
            return self
                .instance
                .settings
                .validate()
                .context("Invalid configuration");
        }
        for (name, instance) in &mut self.instances {
            instance
                .settings
                .validate()
                .with_context(|| format!("Invalid configuration for instance '{name}'"))?;
        }
        Ok(())
    }

    /// Instances to work on, in file order, optionally filtered by name.
    pub fn instances(&self, only: &[String]) -> Result<Vec<(&str, &InstanceConfig)>> {
        let all: Vec<(&str, &InstanceConfig)> = if self.instances.is_empty() {
            vec![(DEFAULT_INSTANCE, &self.instance)]
        } else {
            self.instances
                .iter()
                .map(|(name, instance)| (name.as_str(), instance))
                .collect()
        };
        if only.is_empty() {
            return Ok(all);
        }
        if let Some(missing) = only.iter().find(|name| !all.iter().any(|(n, _)| n == name)) {
            bail!("No instance named '{missing}' in the configuration");
        }
        Ok(all
            .into_iter()
            .filter(|(name, _)| only.iter().any(|o| o == name))
            .collect())
    }
}
