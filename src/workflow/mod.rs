//! The provisioning workflow: plan, execution, progress and report

pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod report;
pub mod step;

pub use orchestrator::{Collaborators, Orchestrator};
pub use plan::{KeySpec, SecretSpec, WorkflowPlan};
pub use progress::{ConsoleProgress, ProgressEvent, ProgressObserver, RecordingProgress, StepOutcome};
pub use report::{CleanupReport, DeletionOutcome, RunReport};
pub use step::WorkflowStep;
