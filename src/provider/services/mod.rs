//! Orchestration services for provider registration and lifecycle.

mod provider;

pub use provider::{
    CreateProviderRequest, ProviderService, ProviderServiceError, ProviderServiceResult,
    ReconciliationError, ReconciliationFailure, ReconciliationOutcome, ScaleDownSweepError,
};
