//! Diesel schema for request-id ownership persistence.

diesel::table! {
    /// Ownership records for proxied A2A task ids.
    a2a_request_tasks (task_id) {
        /// Protocol task identifier.
        #[max_length = 256]
        task_id -> Varchar,
        /// Owning user.
        user_id -> Uuid,
        /// Provider the task was first routed to.
        provider_id -> Uuid,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Latest access timestamp.
        last_accessed_at -> Timestamptz,
    }
}

diesel::table! {
    /// Ownership records for proxied A2A context ids.
    a2a_request_contexts (context_id) {
        /// Protocol context identifier.
        #[max_length = 256]
        context_id -> Varchar,
        /// Owning user.
        user_id -> Uuid,
        /// Provider the context was first routed to.
        provider_id -> Uuid,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Latest access timestamp.
        last_accessed_at -> Timestamptz,
    }
}
