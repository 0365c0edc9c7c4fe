//! Progress notifications emitted while the workflow runs

use std::sync::Mutex;

use super::step::WorkflowStep;
use crate::error::ProvisionError;
use crate::utils::format::DisplayUtils;
use crate::utils::interactive::ProgressIndicator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Skipped,
}

/// Receives a notification as each step starts and finishes.
pub trait ProgressObserver: Send + Sync {
    fn step_started(&self, step: WorkflowStep, description: &str);

    fn step_finished(&self, step: WorkflowStep, outcome: StepOutcome);

    /// A cleanup deletion failed. The run continues with the next deletion.
    fn cleanup_failed(&self, resource: &str, error: &ProvisionError);
}

/// Position of a step in the printed sequence, starting at 1.
pub fn step_number(step: WorkflowStep) -> u8 {
    WorkflowStep::FORWARD
        .iter()
        .position(|s| *s == step)
        .map(|i| i as u8 + 1)
        .unwrap_or(WorkflowStep::FORWARD.len() as u8 + 1)
}

/// Prints numbered steps to the terminal.
pub struct ConsoleProgress {
    display: DisplayUtils,
    spinner: Mutex<Option<ProgressIndicator>>,
}

impl ConsoleProgress {
    pub fn new(no_color: bool) -> Self {
        Self {
            display: DisplayUtils::new(no_color),
            spinner: Mutex::new(None),
        }
    }
}

impl ProgressObserver for ConsoleProgress {
    fn step_started(&self, step: WorkflowStep, description: &str) {
        if step == WorkflowStep::Settle {
            if let Ok(mut spinner) = self.spinner.lock() {
                *spinner = Some(ProgressIndicator::new(description));
            }
            return;
        }
        self.display.print_step(step_number(step), description);
    }

    fn step_finished(&self, step: WorkflowStep, outcome: StepOutcome) {
        if step == WorkflowStep::Settle {
            if let Some(spinner) = self.spinner.lock().ok().and_then(|mut s| s.take()) {
                spinner.finish_with_message("vault DNS settle delay elapsed");
            }
            return;
        }
        match outcome {
            StepOutcome::Failed => self.display.print_error(&format!("{} failed", step)),
            StepOutcome::Skipped => self.display.print_warning(&format!("{} skipped", step)),
            StepOutcome::Succeeded => {}
        }
    }

    fn cleanup_failed(&self, resource: &str, error: &ProvisionError) {
        self.display.print_warning(&format!(
            "Encountered error during resource cleanup of {}: {}",
            resource, error
        ));
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        if let Some(spinner) = self.spinner.get_mut().ok().and_then(|s| s.take()) {
            spinner.finish_and_clear();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started(WorkflowStep, String),
    Finished(WorkflowStep, StepOutcome),
    CleanupFailed(String),
}

/// Keeps every notification in memory.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Steps that were started, in order.
    pub fn started_steps(&self) -> Vec<WorkflowStep> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Started(step, _) => Some(step),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressObserver for RecordingProgress {
    fn step_started(&self, step: WorkflowStep, description: &str) {
        self.push(ProgressEvent::Started(step, description.to_string()));
    }

    fn step_finished(&self, step: WorkflowStep, outcome: StepOutcome) {
        self.push(ProgressEvent::Finished(step, outcome));
    }

    fn cleanup_failed(&self, resource: &str, _error: &ProvisionError) {
        self.push(ProgressEvent::CleanupFailed(resource.to_string()));
    }
}
