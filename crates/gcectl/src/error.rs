//! Error types for gcectl
//!
//! Library errors are folded into [`GcectlError`], which knows how to suggest
//! a way forward and print itself as a cargo-style diagnostic.

use colored::Colorize;
use gcectl_core::{ConfigError, CoreError};
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// Produces structured output like:
/// ```text
/// error: Workflow stopped at step 'create-disk' after 1 completed step(s)
///   operation-123 failed: RESOURCE_ALREADY_EXISTS: The resource already exists
///
///   tip: Temporary resources from completed steps were left in place
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<(String, Vec<String>)>,
}

impl CliDiagnostic {
    /// Start a new error diagnostic with the given message.
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    /// Add a detail line below the error message.
    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    /// Add a tip with optional example commands.
    pub fn tip(mut self, description: &str, commands: &[&str]) -> Self {
        self.tips.push((
            description.to_string(),
            commands.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            eprintln!("  {}", detail);
        }

        for (description, commands) in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
            for cmd in commands {
                eprintln!("      {}", cmd);
            }
        }
    }
}

/// Main error type for the gcectl application
#[derive(Error, Debug)]
pub enum GcectlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("No project configured")]
    MissingProject,

    #[error("No access token available")]
    MissingCredentials,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Request rejected: {message}")]
    Rejected { message: String },

    #[error("Operation {operation} failed: {message}")]
    OperationFailed {
        operation: String,
        codes: Vec<String>,
        message: String,
    },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Workflow stopped at step '{step}' after {} completed step(s)", .completed.len())]
    WorkflowFailed {
        step: String,
        completed: Vec<String>,
        #[source]
        source: Box<GcectlError>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

/// Result type for gcectl operations
pub type Result<T> = std::result::Result<T, GcectlError>;

impl GcectlError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            GcectlError::ProfileNotFound { name } => vec![
                "List available profiles: gcectl profile list".to_string(),
                format!(
                    "Create profile '{}': gcectl profile set {} --project <project>",
                    name, name
                ),
            ],
            GcectlError::MissingProject => vec![
                "Pass --project or set GCECTL_PROJECT".to_string(),
                "Create a profile: gcectl profile set <name> --project <project>".to_string(),
            ],
            GcectlError::MissingCredentials => vec![
                "Pass --access-token or set GCECTL_ACCESS_TOKEN".to_string(),
                "A token can be minted with: gcloud auth print-access-token".to_string(),
                "Store a ${VAR} reference in the profile: gcectl profile set <name> --project <project> --access-token '${GCECTL_ACCESS_TOKEN}'".to_string(),
            ],
            GcectlError::AuthenticationFailed { .. } => vec![
                "Access tokens expire after an hour; mint a fresh one".to_string(),
                "Check the account has Compute permissions on the project".to_string(),
            ],
            GcectlError::NotFound { .. } => vec![
                "Check the resource name and --zone".to_string(),
                "Check that you're using the correct profile: gcectl profile show".to_string(),
            ],
            GcectlError::ConnectionError { .. } => vec![
                "Check network connectivity".to_string(),
                "Retry with more attempts: --retry-attempts 5".to_string(),
            ],
            GcectlError::Timeout { .. } => vec![
                "The operation may still complete; inspect it with: gcectl operation get <name>"
                    .to_string(),
                "Raise the budget with --timeout".to_string(),
            ],
            GcectlError::OperationFailed { codes, .. }
                if codes.iter().any(|c| c == "RESOURCE_ALREADY_EXISTS") =>
            {
                vec![
                    "A resource with the generated name already exists".to_string(),
                    "Use a different --run-id or delete the leftover resource".to_string(),
                ]
            }
            GcectlError::OperationFailed { codes, .. }
                if codes.iter().any(|c| c.starts_with("QUOTA")) =>
            {
                vec!["Check project quotas in the console or request an increase".to_string()]
            }
            GcectlError::WorkflowFailed {
                completed, source, ..
            } => {
                let mut tips = source.suggestions();
                if !completed.is_empty() {
                    tips.push(format!("Completed steps: {}", completed.join(", ")));
                    tips.push(
                        "Resources created by completed steps were left in place unless --cleanup-on-failure was given"
                            .to_string(),
                    );
                }
                tips
            }
            GcectlError::InvalidInput { .. } => {
                vec!["Check the command syntax: gcectl <command> --help".to_string()]
            }
            _ => vec![],
        }
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&format!("{}", self));

        if let GcectlError::WorkflowFailed { source, .. } = self {
            diag = diag.detail(&source.to_string());
        }

        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion, &[]);
        }

        diag.print();
    }
}

impl From<CoreError> for GcectlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Submission { message, status } => GcectlError::Rejected {
                message: match status {
                    Some(code) => format!("HTTP {code}: {message}"),
                    None => message,
                },
            },
            CoreError::OperationFailed { operation, error } => GcectlError::OperationFailed {
                operation,
                codes: error.codes().map(String::from).collect(),
                message: error.to_string(),
            },
            CoreError::Timeout {
                what,
                polls,
                elapsed,
            } => GcectlError::Timeout {
                message: format!("{what} not finished after {polls} polls ({elapsed:?})"),
            },
            CoreError::Lookup { resource } => GcectlError::NotFound {
                message: resource.to_string(),
            },
            CoreError::Transport(message) => GcectlError::ConnectionError { message },
            CoreError::Unauthorized(message) => GcectlError::AuthenticationFailed { message },
            CoreError::Validation(message) => GcectlError::InvalidInput { message },
            CoreError::Config(message) => GcectlError::Config(message),
            CoreError::Workflow {
                step,
                completed,
                source,
            } => GcectlError::WorkflowFailed {
                step,
                completed,
                source: Box::new(GcectlError::from(*source)),
            },
        }
    }
}

impl From<ConfigError> for GcectlError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => GcectlError::ProfileNotFound { name },
            other => GcectlError::Config(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GcectlError {
    fn from(err: serde_json::Error) -> Self {
        GcectlError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for GcectlError {
    fn from(err: std::io::Error) -> Self {
        GcectlError::OutputError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<anyhow::Error> for GcectlError {
    fn from(err: anyhow::Error) -> Self {
        GcectlError::Config(err.to_string())
    }
}
