//! HTTP client handle for forwarding requests to a resolved provider.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Result type for proxied upstream requests.
pub type ProxyRequestResult<T> = Result<T, ProxyRequestError>;

/// Errors raised while forwarding a request upstream.
#[derive(Debug, Clone, Error)]
pub enum ProxyRequestError {
    /// The request path could not be joined onto the provider base URL.
    #[error("invalid proxy path '{path}': {source}")]
    InvalidPath {
        /// The offending relative path.
        path: String,
        /// Why joining failed.
        source: url::ParseError,
    },

    /// The upstream request failed at the transport layer.
    #[error("upstream request failed: {0}")]
    Upstream(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for ProxyRequestError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(Arc::new(err))
    }
}

/// Response from an upstream provider, either fully buffered or streamed.
pub enum UpstreamResponse {
    /// A regular response, read to completion.
    Buffered {
        /// Upstream status code.
        status: StatusCode,
        /// Upstream response headers.
        headers: HeaderMap,
        /// Complete response body.
        body: Bytes,
    },
    /// A server-sent event response, forwarded chunk by chunk.
    ///
    /// The stream owns the upstream connection; dropping it on any exit
    /// path releases the connection.
    Streaming {
        /// Upstream status code.
        status: StatusCode,
        /// Upstream response headers.
        headers: HeaderMap,
        /// Raw body chunks as produced by the upstream.
        stream: BoxStream<'static, Result<Bytes, ProxyRequestError>>,
    },
}

impl UpstreamResponse {
    /// Returns the upstream status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Buffered { status, .. } | Self::Streaming { status, .. } => *status,
        }
    }

    /// Returns the upstream response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        match self {
            Self::Buffered { headers, .. } | Self::Streaming { headers, .. } => headers,
        }
    }
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered { status, body, .. } => f
                .debug_struct("Buffered")
                .field("status", status)
                .field("body_len", &body.len())
                .finish_non_exhaustive(),
            Self::Streaming { status, .. } => f
                .debug_struct("Streaming")
                .field("status", status)
                .finish_non_exhaustive(),
        }
    }
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/event-stream"))
        })
}

/// A request handle bound to one resolved, reachable provider.
///
/// Produced by the proxy service once the provider's compute is up; the
/// caller forwards protocol requests through it without further
/// orchestration.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ProxyClient {
    /// Creates a client for the given provider base URL.
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Returns the resolved provider base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Forwards one request upstream.
    ///
    /// The response is buffered unless the upstream declares
    /// `text/event-stream`, in which case body chunks are handed back as a
    /// stream so events reach the caller as the provider emits them.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyRequestError::InvalidPath`] when `path` does not join
    /// onto the base URL, and [`ProxyRequestError::Upstream`] on transport
    /// failures.
    pub async fn send_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        headers: HeaderMap,
    ) -> ProxyRequestResult<UpstreamResponse> {
        let target = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ProxyRequestError::InvalidPath {
                path: path.to_owned(),
                source,
            })?;

        let mut request = self.http.request(method, target).headers(headers);
        if let Some(payload) = body {
            request = request.json(&payload);
        }
        let response = request.send().await?;

        let status = response.status();
        let response_headers = response.headers().clone();
        if is_event_stream(&response_headers) {
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ProxyRequestError::from))
                .boxed();
            return Ok(UpstreamResponse::Streaming {
                status,
                headers: response_headers,
                stream,
            });
        }

        let buffered = response.bytes().await?;
        Ok(UpstreamResponse::Buffered {
            status,
            headers: response_headers,
            body: buffered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use rstest::rstest;

    fn headers_with_content_type(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).expect("valid header value"),
        );
        headers
    }

    #[rstest]
    #[case::plain_sse("text/event-stream", true)]
    #[case::sse_with_charset("text/event-stream; charset=utf-8", true)]
    #[case::sse_mixed_case("Text/Event-Stream", true)]
    #[case::json("application/json", false)]
    #[case::json_with_charset("application/json; charset=utf-8", false)]
    #[case::sse_prefix_only("text/event-streaming", false)]
    fn content_type_selects_streaming(#[case] content_type: &str, #[case] streaming: bool) {
        let headers = headers_with_content_type(content_type);

        assert_eq!(is_event_stream(&headers), streaming);
    }

    #[rstest]
    fn absent_content_type_buffers() {
        assert!(!is_event_stream(&HeaderMap::new()));
    }
}
