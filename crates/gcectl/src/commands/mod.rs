//! Command implementations for gcectl
//!
//! Each submodule handles one command group. Workflow-backed commands share
//! [`run_workflow`] so they all show the same spinner and report.

pub mod group;
pub mod image;
pub mod instance;
pub mod operation;
pub mod profile;

use crate::error::Result as CliResult;
use crate::output::{self, OutputFormat};
use crate::progress::Spinner;
use colored::Colorize;
use gcectl_core::{Orchestrator, Workflow, WorkflowContext, WorkflowReport};
use serde_json::{Value, json};

/// Run a workflow behind a spinner
///
/// The spinner is finished on success and abandoned on failure, so the
/// last progress message stays visible next to the error.
pub async fn run_workflow(
    orchestrator: &Orchestrator,
    spinner: &Spinner,
    workflow: &Workflow,
    ctx: WorkflowContext,
) -> CliResult<WorkflowReport> {
    match orchestrator.run_workflow(workflow, ctx).await {
        Ok(report) => {
            spinner.finish(format!(
                "{} {} ({} steps)",
                "\u{2713}".green(),
                workflow.name(),
                report.steps.len()
            ));
            Ok(report)
        }
        Err(err) => {
            spinner.abandon(format!("{} {}", "\u{2717}".red(), workflow.name()));
            Err(err.into())
        }
    }
}

/// Print a workflow report
///
/// Tables show one row per step; structured formats print the whole report.
pub fn print_report(
    report: &WorkflowReport,
    format: OutputFormat,
    query: Option<&str>,
) -> CliResult<()> {
    if format == OutputFormat::Table && query.is_none() {
        let rows: Vec<Value> = report
            .steps
            .iter()
            .map(|s| {
                json!({
                    "step": s.step,
                    "operation": s.operation,
                    "target": s.target,
                    "polls": s.polls,
                })
            })
            .collect();
        output::print_output(&rows, format, None)?;

        if report.halted_early {
            println!("Workflow '{}' ended early", report.workflow);
        }
        if !report.temporaries.is_empty() {
            println!(
                "{} temporary resources kept: {}",
                "note:".yellow(),
                report.temporaries.join(", ")
            );
        }
        return Ok(());
    }

    output::print_output(report, format, query)?;
    Ok(())
}
