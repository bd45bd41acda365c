//! The profile file: a TOML document of named profiles plus an optional
//! default, with `${VAR}` references expanded when it is read.

#[cfg(target_os = "macos")]
use directories::BaseDirs;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};
use super::orchestration::OrchestrationConfig;
use crate::client::DEFAULT_ENDPOINT;

/// Zone used when neither the command line nor the profile names one
pub const DEFAULT_ZONE: &str = "europe-west1-d";

/// Contents of `config.toml`
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Profile used when none is given explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Where and how to reach one project
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    /// Project all resources live in
    pub project: String,
    /// Default zone for zonal resources
    #[serde(default = "default_zone")]
    pub zone: String,
    /// API root, overridable for emulators and tests
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token; usually `${VAR}` so the secret stays out of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Orchestration overrides for this profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration: Option<OrchestrationConfig>,
}

impl Profile {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            zone: default_zone(),
            endpoint: default_endpoint(),
            access_token: None,
            orchestration: None,
        }
    }

    /// Orchestration settings, falling back to defaults
    pub fn orchestration(&self) -> OrchestrationConfig {
        self.orchestration.clone().unwrap_or_default()
    }

    /// Access token with unexpanded `${VAR}` placeholders treated as absent
    pub fn resolved_access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty() && !t.starts_with("${"))
    }
}

impl Config {
    /// Resolve which profile name to use
    ///
    /// Explicit name wins, then the configured default, then the only profile
    /// if exactly one exists.
    pub fn resolve_profile(&self, explicit_profile: Option<&str>) -> Result<String> {
        if let Some(name) = explicit_profile.or(self.default_profile.as_deref()) {
            return Ok(name.to_string());
        }

        let names: Vec<&String> = self.profiles.keys().collect();
        match names.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(ConfigError::NoProfiles {
                suggestion: "Use 'gcectl profile set <name> --project <project>' to create one, or pass --project."
                    .to_string(),
            }),
            _ => Err(ConfigError::MissingSetting {
                setting: "default profile".to_string(),
                suggestion: format!(
                    "several profiles exist ({}); pass --profile or run 'gcectl profile default <name>'",
                    names
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }),
        }
    }

    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_string(),
            })
    }

    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Read and parse `path`; a missing file is an empty configuration
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let shown = || path.display().to_string();

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
            path: shown(),
            source,
        })?;

        toml::from_str(&Self::expand_env_vars(&raw)).map_err(|e| ConfigError::ParseError {
            path: shown(),
            source: Box::new(e),
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    /// Write the configuration to `path`, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let write_failed = |at: &Path| {
            let at = at.display().to_string();
            move |source| ConfigError::SaveError { path: at, source }
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_failed(dir))?;
        }
        let body = toml::to_string_pretty(self)?;
        fs::write(path, body).map_err(write_failed(path))
    }

    /// Insert or replace a profile
    pub fn set_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Drop a profile, clearing the default if it pointed there
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// Profiles in name order
    pub fn list_profiles(&self) -> Vec<(&String, &Profile)> {
        self.profiles.iter().collect()
    }

    /// Per-user location of `config.toml`
    ///
    /// On Linux: ~/.config/gcectl/config.toml
    /// On macOS: ~/.config/gcectl/config.toml if present, otherwise
    /// ~/Library/Application Support/com.gcectl.gcectl/config.toml
    /// On Windows: %APPDATA%\gcectl\gcectl\config.toml
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(dirs) = BaseDirs::new() {
                let xdg_dir = dirs.home_dir().join(".config").join("gcectl");
                if xdg_dir.is_dir() {
                    return Ok(xdg_dir.join("config.toml"));
                }
            }
        }

        ProjectDirs::from("com", "gcectl", "gcectl")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::ConfigDirError)
    }

    /// Substitute `${VAR}` and `${VAR:-default}` from the environment
    ///
    /// Unset variables stay as written, so a profile that is never used
    /// cannot break loading.
    ///
    /// Example:
    /// ```toml
    /// access_token = "${GCECTL_ACCESS_TOKEN}"
    /// endpoint = "${GCE_ENDPOINT:-https://compute.googleapis.com/compute/v1}"
    /// ```
    fn expand_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok())
            .into_owned()
    }
}

fn default_zone() -> String {
    DEFAULT_ZONE.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
