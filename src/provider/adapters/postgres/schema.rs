//! Diesel schema for provider registry persistence.

diesel::table! {
    /// Registered provider records.
    providers (id) {
        /// Provider identifier, derived from the normalized source.
        id -> Uuid,
        /// Normalized source location string.
        #[max_length = 500]
        source -> Varchar,
        /// Origin grouping string.
        #[max_length = 200]
        origin -> Varchar,
        /// Back-reference to the declaring registry manifest entry.
        #[max_length = 500]
        registry -> Nullable<Varchar>,
        /// Idle window in seconds; zero disables auto-scale-down.
        auto_stop_timeout_secs -> Int8,
        /// Deployment environment variables as JSONB.
        variables -> Jsonb,
        /// Agent card as JSONB.
        agent_card -> Jsonb,
        /// Owning user.
        created_by -> Uuid,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
        /// Last proxied-request timestamp.
        last_active_at -> Timestamptz,
    }
}
