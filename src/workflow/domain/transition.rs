//! Pure planning of issue status transitions onto the backing pipeline.
//!
//! Planning never mutates anything. Callers obtain a [`TransitionPlan`] (or
//! the full list of violations blocking it) first and only then apply the
//! plan to a pipeline snapshot, so a rejected transition leaves every record
//! untouched.

use super::{
    IssueStatus, Pipeline, PipelineSnapshot, PipelineStatus, PrincipalId, Step, StepId, Task,
    TaskId, TaskStatus,
};
use mockable::Clock;
use std::fmt;
use thiserror::Error;

/// Unfinished work that prevents an issue from resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionViolation {
    /// A task is not in a resolved status.
    Task {
        /// Offending task.
        task_id: TaskId,
        /// Task name.
        task_name: String,
        /// Current task status.
        status: TaskStatus,
    },
    /// A step is not in a resolved status.
    Step {
        /// Offending step.
        step_id: StepId,
        /// Step name.
        step_name: String,
        /// Name of the task owning the step.
        task_name: String,
        /// Current step status.
        status: TaskStatus,
    },
}

impl fmt::Display for ResolutionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task {
                task_name, status, ..
            } => write!(f, "task {task_name} is in {status} status"),
            Self::Step {
                step_name,
                task_name,
                status,
                ..
            } => write!(
                f,
                "step {step_name} in task {task_name} is in {status} status"
            ),
        }
    }
}

/// Conflict returned when an issue cannot resolve.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("can't resolve issue {issue_name}: {}", describe_violations(.violations))]
pub struct ResolutionConflict {
    /// Name of the issue that failed to resolve.
    pub issue_name: String,
    /// Every violation found, in pipeline order.
    pub violations: Vec<ResolutionViolation>,
}

fn describe_violations(violations: &[ResolutionViolation]) -> String {
    match violations {
        [] => "pipeline has unfinished work".to_owned(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Collects every task and step outside `{DONE, CANCELED, SKIPPED}`.
#[must_use]
pub fn resolution_violations(snapshot: &PipelineSnapshot) -> Vec<ResolutionViolation> {
    let mut violations = Vec::new();
    for entry in &snapshot.tasks {
        let task = &entry.task;
        if !task.status().is_resolved() {
            violations.push(ResolutionViolation::Task {
                task_id: task.id(),
                task_name: task.name().to_owned(),
                status: task.status(),
            });
        }
        violations.extend(
            entry
                .steps
                .iter()
                .filter(|step| !step.status().is_resolved())
                .map(|step| ResolutionViolation::Step {
                    step_id: step.id(),
                    step_name: step.name().to_owned(),
                    task_name: task.name().to_owned(),
                    status: step.status(),
                }),
        );
    }
    violations
}

/// Status changes implied by an issue transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// New pipeline status.
    pub pipeline_status: PipelineStatus,
    /// Tasks to move, with their new status.
    pub task_updates: Vec<(TaskId, TaskStatus)>,
    /// Steps to move, with their new status.
    pub step_updates: Vec<(StepId, TaskStatus)>,
}

/// Plans how moving the issue to `target` affects its pipeline.
///
/// - `DONE` requires every task and step to be resolved.
/// - `CANCELED` cancels running tasks and the running steps beneath them;
///   pending work is kept so a reopened issue resumes where it stopped.
/// - `OPEN` parks the pipeline and leaves task and step statuses alone.
///
/// # Errors
///
/// Returns [`ResolutionConflict`] when `target` is `DONE` and unfinished
/// work remains.
pub fn plan_transition(
    issue_name: &str,
    snapshot: &PipelineSnapshot,
    target: IssueStatus,
) -> Result<TransitionPlan, ResolutionConflict> {
    let pipeline_status = PipelineStatus::on_issue_transition(target);
    let mut plan = TransitionPlan {
        pipeline_status,
        task_updates: Vec::new(),
        step_updates: Vec::new(),
    };

    match target {
        IssueStatus::Done => {
            let violations = resolution_violations(snapshot);
            if !violations.is_empty() {
                return Err(ResolutionConflict {
                    issue_name: issue_name.to_owned(),
                    violations,
                });
            }
        }
        IssueStatus::Canceled => {
            for entry in snapshot
                .tasks
                .iter()
                .filter(|entry| entry.task.status() == TaskStatus::Running)
            {
                plan.task_updates
                    .push((entry.task.id(), TaskStatus::Canceled));
                plan.step_updates.extend(
                    entry
                        .steps
                        .iter()
                        .filter(|step| step.status() == TaskStatus::Running)
                        .map(|step| (step.id(), TaskStatus::Canceled)),
                );
            }
        }
        IssueStatus::Open => {}
    }

    Ok(plan)
}

/// Records changed by applying a [`TransitionPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTransition {
    /// The pipeline with its new status.
    pub pipeline: Pipeline,
    /// Tasks whose status changed.
    pub tasks: Vec<Task>,
    /// Steps whose status changed.
    pub steps: Vec<Step>,
}

impl TransitionPlan {
    /// Applies the plan to a snapshot, returning only the changed records.
    #[must_use]
    pub fn apply(
        &self,
        snapshot: PipelineSnapshot,
        actor: PrincipalId,
        clock: &impl Clock,
    ) -> AppliedTransition {
        let PipelineSnapshot {
            mut pipeline,
            tasks: entries,
        } = snapshot;
        pipeline.set_status(self.pipeline_status, actor, clock);

        let mut tasks = Vec::new();
        let mut steps = Vec::new();
        for entry in entries {
            let mut task = entry.task;
            if let Some((_, status)) = self.task_updates.iter().find(|(id, _)| *id == task.id()) {
                task.set_status(*status, actor, clock);
                tasks.push(task);
            }
            for mut step in entry.steps {
                if let Some((_, status)) = self.step_updates.iter().find(|(id, _)| *id == step.id())
                {
                    step.set_status(*status, actor, clock);
                    steps.push(step);
                }
            }
        }

        AppliedTransition {
            pipeline,
            tasks,
            steps,
        }
    }
}
