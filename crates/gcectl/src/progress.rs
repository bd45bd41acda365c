//! Spinner output for long-running operations
//!
//! Turns the orchestrator's progress events into an indicatif spinner on
//! stderr. Indicatif hides the spinner when stderr is not a terminal, so
//! piped output stays clean.

use gcectl_core::{OperationStatus, ProgressCallback, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner plus the callback that drives it
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message(message.into());
        Self { bar }
    }

    /// Callback to hand to the orchestrator
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |event: ProgressEvent| bar.set_message(describe(&event)))
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }
}

/// One-line description of a progress event
pub fn describe(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::StepStarted { step, index, total } => {
            format!("[{}/{}] {}", index + 1, total, step)
        }
        ProgressEvent::Submitted { operation, request } => {
            format!("{} -> {}", request, operation)
        }
        ProgressEvent::Polling {
            operation,
            status,
            progress,
            ..
        } => match progress {
            Some(pct) => format!("{}: {} {}%", operation, format_status(*status), pct),
            None => format!("{}: {}", operation, format_status(*status)),
        },
        ProgressEvent::Completed { operation, polls } => {
            format!("{}: \u{2713} done after {} polls", operation, polls)
        }
        ProgressEvent::Failed { operation, error } => {
            format!("{}: \u{2717} {}", operation, error)
        }
        ProgressEvent::TimedOut { operation, polls } => {
            format!("{}: timed out after {} polls", operation, polls)
        }
        ProgressEvent::StepCompleted { step } => format!("\u{2713} {}", step),
    }
}

/// Format operation status for display with status icons
fn format_status(status: OperationStatus) -> String {
    match status {
        OperationStatus::Pending => format!("\u{2026} {}", status),
        OperationStatus::Running => format!("\u{21bb} {}", status),
        OperationStatus::Done => format!("\u{2713} {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_step_started_is_one_based() {
        let event = ProgressEvent::StepStarted {
            step: "create-disk".to_string(),
            index: 1,
            total: 7,
        };
        assert_eq!(describe(&event), "[2/7] create-disk");
    }

    #[test]
    fn test_describe_polling_with_progress() {
        let event = ProgressEvent::Polling {
            operation: "op-1".to_string(),
            status: OperationStatus::Running,
            progress: Some(40),
            poll: 3,
            elapsed: Duration::from_secs(2),
        };
        let text = describe(&event);
        assert!(text.starts_with("op-1: "));
        assert!(text.ends_with("RUNNING 40%"));
    }
}
