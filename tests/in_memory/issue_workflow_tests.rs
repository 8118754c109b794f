//! End-to-end issue workflow tests against the in-memory store.

use super::helpers::{Setup, create_rollout_issue, set_task_statuses, setup};
use issueflow::workflow::{
    adapters::{TracingDelivery, memory::InMemoryWorkflowStore},
    domain::{
        ActivityType, FieldId, IssueField, IssueStatus, MessagePayload, MessageStatus,
        MessageType, PipelineStatus, PrincipalId, ProjectId, TaskStatus,
    },
    services::{
        CreateIssueRequest, ErrorKind, IssueWorkflowService, PatchIssueRequest,
        TransitionIssueStatusRequest,
    },
};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn issue_lifecycle_records_one_activity_per_committed_change(
    #[from(setup)] harness: Result<Setup, eyre::Report>,
) -> Result<(), eyre::Report> {
    let setup = harness?;
    let creator = PrincipalId::new();
    let dba = PrincipalId::new();
    let issue = create_rollout_issue(&setup.service, ProjectId::new(), creator).await?;

    setup
        .service
        .patch_issue(
            PatchIssueRequest::new(issue.id(), creator)
                .with_assignee(dba)
                .with_payload_field("env", json!("prod")),
        )
        .await?;
    set_task_statuses(&setup, &issue, &[TaskStatus::Running, TaskStatus::Pending]).await?;
    setup
        .service
        .transition_status(
            TransitionIssueStatusRequest::new(issue.id(), dba, IssueStatus::Canceled)
                .with_comment("maintenance window missed"),
        )
        .await?;
    setup
        .service
        .transition_status(TransitionIssueStatusRequest::new(
            issue.id(),
            dba,
            IssueStatus::Open,
        ))
        .await?;
    set_task_statuses(&setup, &issue, &[TaskStatus::Done, TaskStatus::Done]).await?;
    let resolved = setup
        .service
        .transition_status(TransitionIssueStatusRequest::new(
            issue.id(),
            dba,
            IssueStatus::Done,
        ))
        .await?;

    eyre::ensure!(resolved.status() == IssueStatus::Done, "issue not resolved");
    let actions: Vec<ActivityType> = setup
        .service
        .issue_activities(issue.id())
        .await?
        .iter()
        .map(|activity| activity.action())
        .collect();
    eyre::ensure!(
        actions
            == [
                ActivityType::IssueCreate,
                ActivityType::IssueFieldUpdate,
                ActivityType::IssueFieldUpdate,
                ActivityType::IssueStatusUpdate,
                ActivityType::IssueStatusUpdate,
                ActivityType::IssueFieldUpdate,
                ActivityType::IssueStatusUpdate,
            ],
        "unexpected activity trail: {actions:?}"
    );

    let snapshot = setup
        .service
        .pipeline_snapshot(issue.id())
        .await?
        .ok_or_else(|| eyre::eyre!("issue has no pipeline"))?;
    eyre::ensure!(
        snapshot.pipeline.status() == PipelineStatus::Done,
        "pipeline did not follow the issue"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_updates_reach_creator_and_assignee_but_not_actor(
    #[from(setup)] harness: Result<Setup, eyre::Report>,
) -> Result<(), eyre::Report> {
    let setup = harness?;
    let creator = PrincipalId::new();
    let dba = PrincipalId::new();
    let issue = setup
        .service
        .create_issue(
            CreateIssueRequest::new(ProjectId::new(), "Vacuum orders", creator).with_assignee(dba),
        )
        .await?;

    setup
        .service
        .transition_status(TransitionIssueStatusRequest::new(
            issue.id(),
            dba,
            IssueStatus::Done,
        ))
        .await?;

    let creator_inbox = setup.service.inbox(creator).await?;
    let dba_inbox = setup.service.inbox(dba).await?;
    eyre::ensure!(dba_inbox.is_empty(), "actor notified about own action");
    let message = creator_inbox
        .first()
        .ok_or_else(|| eyre::eyre!("creator was not notified"))?;
    eyre::ensure!(creator_inbox.len() == 1, "creator notified more than once");
    eyre::ensure!(message.status() == MessageStatus::Delivered, "message not delivered");
    eyre::ensure!(
        message.message_type() == MessageType::IssueStatusUpdate,
        "unexpected message type"
    );
    eyre::ensure!(
        message.payload()
            == &MessagePayload::StatusUpdate {
                issue_name: "Vacuum orders".to_owned(),
                old_status: IssueStatus::Open,
                new_status: IssueStatus::Done,
            },
        "unexpected payload"
    );
    eyre::ensure!(
        setup.delivery.delivered() == creator_inbox,
        "delivered messages differ from committed messages"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_resolution_leaves_every_record_untouched(
    #[from(setup)] harness: Result<Setup, eyre::Report>,
) -> Result<(), eyre::Report> {
    let setup = harness?;
    let creator = PrincipalId::new();
    let issue = create_rollout_issue(&setup.service, ProjectId::new(), creator).await?;
    set_task_statuses(&setup, &issue, &[TaskStatus::Done, TaskStatus::Failed]).await?;
    let issue_before = setup.service.get_issue(issue.id()).await?;
    let pipeline_before = setup.service.pipeline_snapshot(issue.id()).await?;
    let activities_before = setup.service.issue_activities(issue.id()).await?;

    let result = setup
        .service
        .transition_status(TransitionIssueStatusRequest::new(
            issue.id(),
            creator,
            IssueStatus::Done,
        ))
        .await;

    let Err(err) = result else {
        return Err(eyre::eyre!("resolution with a failed task must conflict"));
    };
    eyre::ensure!(err.kind() == ErrorKind::Conflict, "unexpected error kind: {err}");
    eyre::ensure!(
        err.to_string()
            == concat!(
                "can't resolve issue Add order note: ",
                "task production is in FAILED status (and 1 more)"
            ),
        "unexpected message: {err}"
    );
    eyre::ensure!(
        setup.service.get_issue(issue.id()).await? == issue_before,
        "issue changed"
    );
    eyre::ensure!(
        setup.service.pipeline_snapshot(issue.id()).await? == pipeline_before,
        "pipeline changed"
    );
    eyre::ensure!(
        setup.service.issue_activities(issue.id()).await? == activities_before,
        "activity written for a rejected transition"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn payload_field_can_be_set_changed_and_cleared(
    #[from(setup)] harness: Result<Setup, eyre::Report>,
) -> Result<(), eyre::Report> {
    let setup = harness?;
    let creator = PrincipalId::new();
    let issue = setup
        .service
        .create_issue(
            CreateIssueRequest::new(ProjectId::new(), "Tag env", creator)
                .with_payload_field("env", json!("staging")),
        )
        .await?;

    let changed = setup
        .service
        .patch_issue(
            PatchIssueRequest::new(issue.id(), creator).with_payload_field("env", json!("prod")),
        )
        .await?;
    let cleared = setup
        .service
        .patch_issue(
            PatchIssueRequest::new(issue.id(), creator)
                .with_payload_field("env", serde_json::Value::Null),
        )
        .await?;

    let env = issueflow::workflow::domain::PayloadKey::new("env")?;
    eyre::ensure!(changed.payload().get(&env) == &json!("prod"), "env not changed");
    eyre::ensure!(cleared.payload().is_empty(), "env not cleared");
    let activities = setup.service.issue_activities(issue.id()).await?;
    let last = activities
        .last()
        .ok_or_else(|| eyre::eyre!("missing clear activity"))?;
    let change = last
        .change_list()
        .find(&FieldId::Payload(env))
        .ok_or_else(|| eyre::eyre!("missing env change"))?;
    eyre::ensure!(change.old_value == json!("prod"), "wrong old value");
    eyre::ensure!(change.new_value.is_null(), "wrong new value");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn assignment_change_is_recorded_with_old_and_new_values(
    #[from(setup)] harness: Result<Setup, eyre::Report>,
) -> Result<(), eyre::Report> {
    let setup = harness?;
    let creator = PrincipalId::new();
    let first = PrincipalId::new();
    let second = PrincipalId::new();
    let issue = setup
        .service
        .create_issue(
            CreateIssueRequest::new(ProjectId::new(), "Reindex", creator).with_assignee(first),
        )
        .await?;

    setup
        .service
        .patch_issue(PatchIssueRequest::new(issue.id(), second).with_assignee(second))
        .await?;

    let activities = setup.service.issue_activities(issue.id()).await?;
    let change = activities
        .last()
        .and_then(|activity| activity.change_list().find(&FieldId::Builtin(IssueField::Assignee)))
        .ok_or_else(|| eyre::eyre!("missing assignee change"))?;
    eyre::ensure!(change.old_value == json!(first.to_string()), "wrong old assignee");
    eyre::ensure!(change.new_value == json!(second.to_string()), "wrong new assignee");

    let receivers: Vec<PrincipalId> = setup
        .delivery
        .delivered()
        .iter()
        .map(issueflow::workflow::domain::Message::receiver)
        .collect();
    eyre::ensure!(
        receivers == [first, creator],
        "unexpected receivers: {receivers:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tracing_delivery_accepts_committed_messages() -> Result<(), eyre::Report> {
    let service = IssueWorkflowService::new(
        Arc::new(InMemoryWorkflowStore::new()),
        Arc::new(TracingDelivery),
        Arc::new(DefaultClock),
    );
    let creator = PrincipalId::new();
    let issue = service
        .create_issue(CreateIssueRequest::new(ProjectId::new(), "Logged", creator))
        .await?;

    let assignee = PrincipalId::new();
    service
        .patch_issue(PatchIssueRequest::new(issue.id(), creator).with_assignee(assignee))
        .await?;

    eyre::ensure!(service.inbox(assignee).await?.len() == 1, "message not stored");
    Ok(())
}
