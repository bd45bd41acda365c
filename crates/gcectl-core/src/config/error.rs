use std::io;
use thiserror::Error;

/// Failures reading, writing or querying the profile file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    LoadError {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    SaveError {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot parse {path}: {source}")]
    ParseError {
        path: String,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("Cannot encode profiles as TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("No profiles configured. {suggestion}")]
    NoProfiles { suggestion: String },

    #[error("Missing {setting}: {suggestion}")]
    MissingSetting { setting: String, suggestion: String },

    #[error("No home directory to keep gcectl settings in")]
    ConfigDirError,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
