//! Orchestration services for A2A request proxying.

mod a2a;
mod client;

pub use a2a::{A2AProxyError, A2AProxyResult, A2AProxyService, RequestIds};
pub use client::{ProxyClient, ProxyRequestError, ProxyRequestResult, UpstreamResponse};
