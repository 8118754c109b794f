//! Receiver resolution for issue notifications.

use super::PrincipalId;

/// Resolves who is notified about a change to an issue.
///
/// Candidates, in order: the current assignee; the previous assignee when
/// set and not the creator; the creator when not the current assignee.
/// Duplicates and the acting principal are removed, so nobody is ever
/// notified about their own action.
#[must_use]
pub fn notification_receivers(
    creator: PrincipalId,
    previous_assignee: Option<PrincipalId>,
    current_assignee: Option<PrincipalId>,
    actor: PrincipalId,
) -> Vec<PrincipalId> {
    let candidates = [
        current_assignee,
        previous_assignee.filter(|previous| *previous != creator),
        (current_assignee != Some(creator)).then_some(creator),
    ];

    let mut receivers: Vec<PrincipalId> = Vec::with_capacity(candidates.len());
    for receiver in candidates.into_iter().flatten() {
        if receiver != actor && !receivers.contains(&receiver) {
            receivers.push(receiver);
        }
    }
    receivers
}
