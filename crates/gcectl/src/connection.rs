//! Connection management: profile resolution and orchestrator construction

use crate::cli::Cli;
use crate::error::{GcectlError, Result as CliResult};
use anyhow::Context;
use gcectl_core::config::DEFAULT_ZONE;
use gcectl_core::{
    ComputeClient, Config, ConfigError, DEFAULT_ENDPOINT, OrchestrationConfig, Orchestrator,
    ProgressCallback, Profile, RetryPolicy, Scope,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Everything a command needs to talk to the API
#[derive(Debug, Clone)]
pub struct Session {
    /// Profile the settings came from, if any
    pub profile: Option<String>,
    pub project: String,
    pub zone: String,
    pub endpoint: String,
    pub access_token: Option<String>,
    pub orchestration: OrchestrationConfig,
}

impl Session {
    pub fn zone_scope(&self) -> Scope {
        Scope::zone(&self.zone)
    }
}

/// Connection manager for creating authenticated orchestrators
#[derive(Clone)]
pub struct ConnectionManager {
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl ConnectionManager {
    /// Create a new connection manager with a custom config path
    pub fn with_config_path(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Save an updated configuration to wherever this one was loaded from
    pub fn save_config(&self, config: &Config) -> CliResult<()> {
        if let Some(ref path) = self.config_path {
            config
                .save_to_path(path)
                .context("Failed to save configuration")?;
        } else {
            config.save().context("Failed to save configuration")?;
        }
        Ok(())
    }

    /// Path of the configuration file in use
    pub fn config_file(&self) -> CliResult<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Config::config_path()?),
        }
    }

    /// Pick the profile for this invocation
    ///
    /// An explicit `--profile` must exist. Otherwise the default (or only)
    /// profile is used; with `--project` given, having no profile at all is
    /// fine.
    fn resolve_profile(&self, cli: &Cli) -> CliResult<Option<(String, Profile)>> {
        let name = match self.config.resolve_profile(cli.profile.as_deref()) {
            Ok(name) => name,
            Err(ConfigError::NoProfiles { .. } | ConfigError::MissingSetting { .. })
                if cli.project.is_some() =>
            {
                debug!("No profile selected, relying on command line settings");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let profile = self.config.profile(&name)?.clone();
        info!("Using profile: {}", name);
        Ok(Some((name, profile)))
    }

    /// Merge command line flags, environment and profile into a session
    ///
    /// Precedence: flags and their env vars, then the profile, then defaults.
    pub fn session(&self, cli: &Cli) -> CliResult<Session> {
        let resolved = self.resolve_profile(cli)?;
        let profile = resolved.as_ref().map(|(_, p)| p);
        trace!("Resolved profile: {:?}", resolved.as_ref().map(|(n, _)| n));

        let project = cli
            .project
            .clone()
            .or_else(|| profile.map(|p| p.project.clone()))
            .filter(|p| !p.is_empty())
            .ok_or(GcectlError::MissingProject)?;

        let zone = cli
            .zone
            .clone()
            .or_else(|| profile.map(|p| p.zone.clone()))
            .unwrap_or_else(|| DEFAULT_ZONE.to_string());

        let endpoint = cli
            .endpoint
            .clone()
            .or_else(|| profile.map(|p| p.endpoint.clone()))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let access_token = cli
            .access_token
            .clone()
            .or_else(|| profile.and_then(|p| p.resolved_access_token().map(String::from)));

        let mut orchestration = profile.map(|p| p.orchestration()).unwrap_or_default();
        apply_overrides(&mut orchestration, cli);

        debug!(
            "Session: project={}, zone={}, endpoint={}, token={}",
            project,
            zone,
            endpoint,
            if access_token.is_some() { "set" } else { "none" }
        );

        Ok(Session {
            profile: resolved.map(|(name, _)| name),
            project,
            zone,
            endpoint,
            access_token,
            orchestration,
        })
    }

    /// Build an orchestrator for a session
    ///
    /// A token is required against the public endpoint; custom endpoints
    /// (emulators, test servers) may run without one.
    pub fn orchestrator(
        &self,
        session: &Session,
        progress: Option<ProgressCallback>,
    ) -> CliResult<Orchestrator> {
        if session.access_token.is_none() && session.endpoint == DEFAULT_ENDPOINT {
            return Err(GcectlError::MissingCredentials);
        }

        let mut builder = ComputeClient::builder().endpoint(&session.endpoint);
        if let Some(token) = &session.access_token {
            builder = builder.access_token(token);
        }
        let client = builder.build()?;

        let mut orchestrator = Orchestrator::new(Arc::new(client))
            .with_poll(session.orchestration.operation_poll())
            .with_retry(RetryPolicy::from(&session.orchestration.retry));
        if let Some(callback) = progress {
            orchestrator = orchestrator.with_progress(callback);
        }
        Ok(orchestrator)
    }
}

/// Apply the global polling and retry flags
fn apply_overrides(orchestration: &mut OrchestrationConfig, cli: &Cli) {
    if let Some(interval) = cli.poll_interval {
        orchestration.poll_interval_secs = interval;
    }
    if let Some(timeout) = cli.timeout {
        orchestration.timeout_secs = Some(timeout);
    }
    if let Some(attempts) = cli.retry_attempts {
        orchestration.retry.enabled = true;
        orchestration.retry.max_attempts = attempts;
    }
    if cli.no_retry {
        orchestration.retry.enabled = false;
    }
}

/// Convert a seconds flag into a duration
pub fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}
