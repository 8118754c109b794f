//! Diesel schema for issue workflow persistence.

diesel::table! {
    /// Issue records.
    issues (id) {
        /// Issue identifier.
        id -> Uuid,
        /// Workspace scope.
        workspace_id -> Uuid,
        /// Owning project.
        project_id -> Uuid,
        /// Issue name.
        #[max_length = 255]
        name -> Varchar,
        /// Issue status.
        #[max_length = 50]
        status -> Varchar,
        /// Current assignee.
        assignee_id -> Nullable<Uuid>,
        /// Subscriber identifiers as a JSON array.
        subscriber_ids -> Jsonb,
        /// Free-text description.
        description -> Text,
        /// Forward SQL statement.
        sql_statement -> Nullable<Text>,
        /// Rollback SQL statement.
        rollback_statement -> Nullable<Text>,
        /// Backing pipeline.
        pipeline_id -> Nullable<Uuid>,
        /// Extra payload fields.
        payload -> Jsonb,
        /// Creator.
        creator_id -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last updater.
        updater_id -> Uuid,
        /// Last update timestamp.
        updated_at -> Timestamptz,
        /// Optimistic concurrency version.
        version -> Int8,
    }
}

diesel::table! {
    /// Pipeline records.
    pipelines (id) {
        /// Pipeline identifier.
        id -> Uuid,
        /// Workspace scope.
        workspace_id -> Uuid,
        /// Pipeline name.
        #[max_length = 255]
        name -> Varchar,
        /// Pipeline status.
        #[max_length = 50]
        status -> Varchar,
        /// Creator.
        creator_id -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last updater.
        updater_id -> Uuid,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Pipeline task records.
    pipeline_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning pipeline.
        pipeline_id -> Uuid,
        /// Position within the pipeline.
        position -> Int4,
        /// Task name.
        #[max_length = 255]
        name -> Varchar,
        /// Task status.
        #[max_length = 50]
        status -> Varchar,
        /// Task type identifier.
        #[max_length = 100]
        task_type -> Varchar,
        /// Target instance.
        instance_id -> Uuid,
        /// Target database.
        database_id -> Nullable<Uuid>,
        /// Target environment.
        environment_id -> Nullable<Uuid>,
        /// Type-specific payload.
        payload -> Jsonb,
        /// Creator.
        creator_id -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last updater.
        updater_id -> Uuid,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Task step records.
    task_steps (id) {
        /// Step identifier.
        id -> Uuid,
        /// Owning task.
        task_id -> Uuid,
        /// Owning pipeline.
        pipeline_id -> Uuid,
        /// Owning issue.
        issue_id -> Uuid,
        /// Position within the task.
        position -> Int4,
        /// Step name.
        #[max_length = 255]
        name -> Varchar,
        /// Step status.
        #[max_length = 50]
        status -> Varchar,
        /// Creator.
        creator_id -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last updater.
        updater_id -> Uuid,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only issue activity records.
    issue_activities (id) {
        /// Activity identifier.
        id -> Uuid,
        /// Workspace scope.
        workspace_id -> Uuid,
        /// Issue the activity belongs to.
        container_id -> Uuid,
        /// Action identifier.
        #[max_length = 100]
        action_type -> Varchar,
        /// Acting principal.
        actor_id -> Uuid,
        /// Free-form comment.
        comment -> Text,
        /// Structured payload with the change list.
        payload -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Notification message records.
    issue_messages (id) {
        /// Message identifier.
        id -> Uuid,
        /// Workspace scope.
        workspace_id -> Uuid,
        /// Issue the message refers to.
        container_id -> Uuid,
        /// Principal that triggered the message.
        actor_id -> Uuid,
        /// Receiving principal.
        receiver_id -> Uuid,
        /// Delivery status.
        #[max_length = 50]
        status -> Varchar,
        /// Message type identifier.
        #[max_length = 100]
        message_type -> Varchar,
        /// Typed payload.
        payload -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}
