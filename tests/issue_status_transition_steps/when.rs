//! When steps for issue status transition BDD scenarios.

use super::world::{IssueTransitionWorld, run_async};
use issueflow::workflow::{domain::IssueStatus, services::TransitionIssueStatusRequest};
use rstest_bdd_macros::when;

#[when(r#""{actor}" moves the issue to "{status}""#)]
fn move_issue(
    world: &mut IssueTransitionWorld,
    actor: String,
    status: String,
) -> Result<(), eyre::Report> {
    let target = IssueStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid issue status in scenario: {err}"))?;
    let actor_id = world.principal(&actor);
    let issue_id = world.issue()?.id();

    let result = run_async(
        world
            .service
            .transition_status(TransitionIssueStatusRequest::new(issue_id, actor_id, target)),
    );
    if let Ok(ref updated) = result {
        world.issue = Some(updated.clone());
    }
    world.last_transition_result = Some(result);
    Ok(())
}
