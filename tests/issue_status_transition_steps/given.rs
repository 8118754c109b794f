//! Given steps for issue status transition BDD scenarios.

use super::world::{IssueTransitionWorld, rollout_task, run_async};
use eyre::WrapErr;
use issueflow::workflow::{
    domain::{IssueStatus, TaskStatus},
    services::{
        CreateIssueRequest, PatchIssueRequest, PipelineDefinition, TransitionIssueStatusRequest,
    },
};
use rstest_bdd_macros::given;

fn parse_task_status(raw: &str) -> Result<TaskStatus, eyre::Report> {
    TaskStatus::try_from(raw).map_err(|err| eyre::eyre!("invalid task status in scenario: {err}"))
}

#[given(r#"an issue "{name}" with a two-task rollout pipeline"#)]
fn issue_with_rollout_pipeline(
    world: &mut IssueTransitionWorld,
    name: String,
) -> Result<(), eyre::Report> {
    let creator = world.principal("creator");
    let pipeline = PipelineDefinition::new("Rollout")
        .with_task(rollout_task("staging", &["plan", "apply"]))
        .with_task(rollout_task("production", &["apply"]));
    let request = CreateIssueRequest::new(world.project_id, name, creator).with_pipeline(pipeline);

    let issue = run_async(world.service.create_issue(request))
        .wrap_err("create issue for transition scenario")?;
    world.issue = Some(issue);
    Ok(())
}

#[given(r#"every task of the pipeline is "{status}""#)]
fn every_task_is(world: &mut IssueTransitionWorld, status: String) -> Result<(), eyre::Report> {
    let parsed = parse_task_status(&status)?;
    world.set_task_statuses(&[parsed, parsed])
}

#[given(r#"the pipeline tasks are "{first}" and "{second}""#)]
fn pipeline_tasks_are(
    world: &mut IssueTransitionWorld,
    first: String,
    second: String,
) -> Result<(), eyre::Report> {
    let statuses = [parse_task_status(&first)?, parse_task_status(&second)?];
    world.set_task_statuses(&statuses)
}

#[given(r#""{actor}" has moved the issue to "{status}""#)]
fn issue_has_been_moved(
    world: &mut IssueTransitionWorld,
    actor: String,
    status: String,
) -> Result<(), eyre::Report> {
    let target = IssueStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid issue status in scenario: {err}"))?;
    let actor_id = world.principal(&actor);
    let issue_id = world.issue()?.id();

    let moved = run_async(
        world
            .service
            .transition_status(TransitionIssueStatusRequest::new(issue_id, actor_id, target)),
    )
    .wrap_err("move issue in scenario setup")?;
    world.issue = Some(moved);
    Ok(())
}

#[given(r#"the issue is assigned to "{assignee}""#)]
fn issue_is_assigned(
    world: &mut IssueTransitionWorld,
    assignee: String,
) -> Result<(), eyre::Report> {
    let creator = world.principal("creator");
    let assignee_id = world.principal(&assignee);
    let issue_id = world.issue()?.id();

    let assigned = run_async(
        world
            .service
            .patch_issue(PatchIssueRequest::new(issue_id, creator).with_assignee(assignee_id)),
    )
    .wrap_err("assign issue in scenario setup")?;
    world.issue = Some(assigned);
    Ok(())
}
