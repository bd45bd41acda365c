//! Operation inspection command implementations

use crate::cli::{Cli, OperationCommands};
use crate::connection::{ConnectionManager, Session};
use crate::error::Result as CliResult;
use crate::output::{self, OutputFormat};
use crate::progress::Spinner;
use gcectl_core::{OperationHandle, OperationOutcome, Scope};
use serde_json::{Value, json};
use tracing::debug;

/// Handle operation commands
pub async fn handle_operation_command(
    operation_cmd: &OperationCommands,
    conn_mgr: &ConnectionManager,
    cli: &Cli,
) -> CliResult<()> {
    match operation_cmd {
        OperationCommands::Get { name, scope } => {
            handle_get(conn_mgr, cli, name, scope.as_deref()).await
        }
        OperationCommands::Wait { name, scope } => {
            handle_wait(conn_mgr, cli, name, scope.as_deref()).await
        }
    }
}

/// `--scope` if given, else the session zone
fn resolve_scope(session: &Session, scope: Option<&str>) -> CliResult<Scope> {
    match scope {
        Some(s) => Ok(s.parse::<Scope>()?),
        None => Ok(session.zone_scope()),
    }
}

async fn handle_get(
    conn_mgr: &ConnectionManager,
    cli: &Cli,
    name: &str,
    scope: Option<&str>,
) -> CliResult<()> {
    let session = conn_mgr.session(cli)?;
    let scope = resolve_scope(&session, scope)?;
    let orchestrator = conn_mgr.orchestrator(&session, None)?;
    debug!("Querying operation {} in {}", name, scope);

    let snapshot = orchestrator
        .get_operation(&session.project, &scope, name)
        .await?;

    let mut doc = serde_json::to_value(&snapshot)?;
    doc["name"] = json!(name);
    doc["scope"] = json!(scope.to_string());

    let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
    output::print_output(&doc, format, cli.query.as_deref())?;
    Ok(())
}

async fn handle_wait(
    conn_mgr: &ConnectionManager,
    cli: &Cli,
    name: &str,
    scope: Option<&str>,
) -> CliResult<()> {
    let session = conn_mgr.session(cli)?;
    let scope = resolve_scope(&session, scope)?;
    let handle = OperationHandle::new(&session.project, scope, name);

    let spinner = Spinner::new(format!("Waiting for {}", handle));
    let orchestrator = conn_mgr.orchestrator(&session, Some(spinner.callback()))?;
    let poll = *orchestrator.poll_config();

    let outcome = match orchestrator.poll_until_terminal(&handle, &poll).await {
        Ok(outcome) => outcome,
        Err(err) => {
            spinner.abandon(format!("{}: query failed", handle.name));
            return Err(err.into());
        }
    };

    if outcome.is_success() {
        spinner.finish(format!("{}: {}", handle.name, outcome.label()));
    } else {
        spinner.abandon(format!("{}: {}", handle.name, outcome.label()));
    }

    let format = OutputFormat::resolve(cli.output, OutputFormat::Table);
    output::print_output(outcome_summary(&outcome), format, cli.query.as_deref())?;

    outcome.into_result()?;
    Ok(())
}

/// Flat view of a terminal outcome
fn outcome_summary(outcome: &OperationOutcome) -> Value {
    match outcome {
        OperationOutcome::Succeeded(completed) => json!({
            "operation": completed.handle.name,
            "outcome": outcome.label(),
            "polls": completed.polls,
            "targetLink": completed.snapshot.target_link,
        }),
        OperationOutcome::Failed { handle, error, polls } => json!({
            "operation": handle.name,
            "outcome": outcome.label(),
            "polls": polls,
            "error": error.to_string(),
            "codes": error.codes().collect::<Vec<_>>(),
        }),
        OperationOutcome::TimedOut {
            handle,
            polls,
            elapsed,
        } => json!({
            "operation": handle.name,
            "outcome": outcome.label(),
            "polls": polls,
            "elapsedSecs": elapsed.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcectl_core::{
        CompletedOperation, OperationError, OperationErrorItem, OperationSnapshot,
        OrchestrationConfig,
    };
    use std::time::Duration;

    fn session() -> Session {
        Session {
            profile: None,
            project: "p".to_string(),
            zone: "europe-west1-d".to_string(),
            endpoint: "http://localhost".to_string(),
            access_token: None,
            orchestration: OrchestrationConfig::default(),
        }
    }

    #[test]
    fn test_scope_defaults_to_session_zone() {
        assert_eq!(
            resolve_scope(&session(), None).unwrap(),
            Scope::zone("europe-west1-d")
        );
        assert_eq!(
            resolve_scope(&session(), Some("global")).unwrap(),
            Scope::Global
        );
        assert!(resolve_scope(&session(), Some(" ")).is_err());
    }

    #[test]
    fn test_outcome_summary() {
        let handle = OperationHandle::new("p", Scope::Global, "op-1");
        let failed = OperationOutcome::Failed {
            handle: handle.clone(),
            error: OperationError {
                errors: vec![OperationErrorItem::new("RESOURCE_ALREADY_EXISTS")],
            },
            polls: 4,
        };
        let summary = outcome_summary(&failed);
        assert_eq!(summary["outcome"], "FAILED");
        assert_eq!(summary["codes"], json!(["RESOURCE_ALREADY_EXISTS"]));

        let done = OperationOutcome::Succeeded(CompletedOperation {
            handle: handle.clone(),
            snapshot: OperationSnapshot::done(),
            polls: 2,
        });
        assert_eq!(outcome_summary(&done)["polls"], 2);

        let timed_out = OperationOutcome::TimedOut {
            handle,
            polls: 5,
            elapsed: Duration::from_secs(5),
        };
        assert_eq!(outcome_summary(&timed_out)["outcome"], "TIMED_OUT");
    }
}
