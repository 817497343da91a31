//! Unit tests for the deployment module.
//!
//! Tests are organised by concern: the derived state machine and manifest
//! rendering, then the in-memory manager's orchestration lifecycle.
