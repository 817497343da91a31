//! Adapter implementations for provider registry and card-loading ports.

pub mod http;
pub mod memory;
pub mod postgres;
