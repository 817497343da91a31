//! Adapter implementations for proxy ports.

pub mod memory;
pub mod postgres;
