//! Identifier newtypes for the issue workflow domain.
//!
//! Every record type gets its own UUID wrapper so that an issue id can never
//! be passed where a task id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the wrapped UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an issue.
    IssueId
);
uuid_id!(
    /// Unique identifier for a pipeline.
    PipelineId
);
uuid_id!(
    /// Unique identifier for a pipeline task.
    TaskId
);
uuid_id!(
    /// Unique identifier for a task step.
    StepId
);
uuid_id!(
    /// Unique identifier for an activity record.
    ActivityId
);
uuid_id!(
    /// Unique identifier for a notification message.
    MessageId
);
uuid_id!(
    /// Identifier of a user or bot principal.
    PrincipalId
);
uuid_id!(
    /// Identifier of the project an issue belongs to.
    ProjectId
);
uuid_id!(
    /// Identifier of the workspace that scopes every record.
    WorkspaceId
);
uuid_id!(
    /// Identifier of a database instance targeted by a task.
    InstanceId
);
uuid_id!(
    /// Identifier of an environment a task runs in.
    EnvironmentId
);
uuid_id!(
    /// Identifier of a database targeted by a task.
    DatabaseId
);

impl DatabaseId {
    /// Sentinel supplied by clients when a task has no database yet.
    pub const EMPTY: Self = Self(Uuid::nil());

    /// Returns `None` for the [`DatabaseId::EMPTY`] sentinel.
    #[must_use]
    pub fn non_empty(self) -> Option<Self> {
        (self != Self::EMPTY).then_some(self)
    }
}
