//! Then steps for issue status transition BDD scenarios.

use super::world::{IssueTransitionWorld, run_async};
use issueflow::workflow::{
    domain::{
        IssueStatus, MessageType, PipelineSnapshot, PipelineStatus, ResolutionViolation,
        TaskStatus,
    },
    services::IssueWorkflowError,
};
use rstest_bdd_macros::then;

fn snapshot(world: &IssueTransitionWorld) -> Result<PipelineSnapshot, eyre::Report> {
    let issue_id = world.issue()?.id();
    run_async(world.service.pipeline_snapshot(issue_id))?
        .ok_or_else(|| eyre::eyre!("scenario issue has no pipeline"))
}

fn known_principal(
    world: &IssueTransitionWorld,
    name: &str,
) -> Result<issueflow::workflow::domain::PrincipalId, eyre::Report> {
    world
        .principals
        .get(name)
        .copied()
        .ok_or_else(|| eyre::eyre!("unknown principal {name} in scenario"))
}

#[then(r#"the issue status is "{status}""#)]
fn issue_status_is(world: &IssueTransitionWorld, status: String) -> Result<(), eyre::Report> {
    let expected = IssueStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let stored = run_async(world.service.get_issue(world.issue()?.id()))?;

    if stored.status() != expected {
        return Err(eyre::eyre!(
            "expected issue status {expected}, found {}",
            stored.status()
        ));
    }
    Ok(())
}

#[then(r#"the pipeline status is "{status}""#)]
fn pipeline_status_is(world: &IssueTransitionWorld, status: String) -> Result<(), eyre::Report> {
    let expected = PipelineStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let found = snapshot(world)?.pipeline.status();

    if found != expected {
        return Err(eyre::eyre!(
            "expected pipeline status {expected}, found {found}"
        ));
    }
    Ok(())
}

#[then(r#"the pipeline tasks are now "{first}" and "{second}""#)]
fn pipeline_tasks_are_now(
    world: &IssueTransitionWorld,
    first: String,
    second: String,
) -> Result<(), eyre::Report> {
    let expected = [first.as_str(), second.as_str()]
        .into_iter()
        .map(TaskStatus::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let found: Vec<TaskStatus> = snapshot(world)?
        .tasks
        .iter()
        .map(|entry| entry.task.status())
        .collect();

    if found != expected {
        return Err(eyre::eyre!(
            "expected task statuses {expected:?}, found {found:?}"
        ));
    }
    Ok(())
}

#[then(r#"the transition is rejected because task "{task}" is "{status}""#)]
fn transition_rejected_by_task(
    world: &IssueTransitionWorld,
    task: String,
    status: String,
) -> Result<(), eyre::Report> {
    let expected_status = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let result = world
        .last_transition_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing transition result"))?;

    let Err(IssueWorkflowError::UnresolvedWork(conflict)) = result else {
        return Err(eyre::eyre!("expected UnresolvedWork error, got {result:?}"));
    };
    let blocked = conflict.violations.iter().any(|violation| {
        matches!(
            violation,
            ResolutionViolation::Task {
                task_name,
                status: found_status,
                ..
            } if *task_name == task && *found_status == expected_status
        )
    });
    if !blocked {
        return Err(eyre::eyre!(
            "task {task} in {expected_status} not among violations: {conflict}"
        ));
    }
    Ok(())
}

#[then(r#""{receiver}" receives a "{message_type}" message"#)]
fn receives_message(
    world: &IssueTransitionWorld,
    receiver: String,
    message_type: String,
) -> Result<(), eyre::Report> {
    let receiver_id = known_principal(world, &receiver)?;
    let inbox = run_async(world.service.inbox(receiver_id))?;
    let delivered = world
        .delivery
        .delivered()
        .iter()
        .filter(|message| message.receiver() == receiver_id)
        .count();

    let found = inbox
        .iter()
        .any(|message| message.message_type().as_str() == message_type);
    if !found || delivered != inbox.len() {
        return Err(eyre::eyre!(
            "{receiver} expected a {message_type} message, inbox holds {:?}",
            inbox
                .iter()
                .map(|message| message.message_type())
                .collect::<Vec<MessageType>>()
        ));
    }
    Ok(())
}

#[then(r#""{receiver}" receives no message"#)]
fn receives_no_message(world: &IssueTransitionWorld, receiver: String) -> Result<(), eyre::Report> {
    let receiver_id = known_principal(world, &receiver)?;
    let inbox = run_async(world.service.inbox(receiver_id))?;

    if !inbox.is_empty() {
        return Err(eyre::eyre!(
            "{receiver} expected no message, found {}",
            inbox.len()
        ));
    }
    Ok(())
}

#[then("the issue has {count:usize} activity")]
fn issue_has_activities(world: &IssueTransitionWorld, count: usize) -> Result<(), eyre::Report> {
    let activities = run_async(world.service.issue_activities(world.issue()?.id()))?;

    if activities.len() != count {
        return Err(eyre::eyre!(
            "expected {count} activities, found {}",
            activities.len()
        ));
    }
    Ok(())
}
