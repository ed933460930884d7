//! Common utilities shared across HTTP connectors.

use crate::error::{Error, Result};
use reqwest::{Client, Response};
use std::time::Duration;

/// Default HTTP timeout for all connectors.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry-after used when a 429 carries no usable header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Creates a configured HTTP client with timeout.
#[must_use]
pub fn create_http_client() -> Client {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Validates a service base URL.
pub fn validate_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }
    if url.len() < 10 {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }
    Ok(())
}

/// Turns a bare data-plane host into a base URL without trailing slash.
#[must_use]
pub fn host_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Maps an HTTP error status to an error.
pub fn handle_http_error(status_code: u16, body: &str, service: &str) -> Error {
    match status_code {
        429 => Error::RateLimit(DEFAULT_RETRY_AFTER_SECS),
        401 | 403 => Error::Authentication(format!("{} auth failed: {}", service, body)),
        _ => Error::Service {
            service: service.to_string(),
            status: status_code,
            body: body.to_string(),
        },
    }
}

/// Passes successful responses through and converts the rest into errors.
pub async fn check_response(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(handle_http_error(status.as_u16(), &body, service))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_http_error_rate_limit() {
        let err = handle_http_error(429, "too many requests", "Pinecone");
        assert!(matches!(err, Error::RateLimit(60)));
    }

    #[test]
    fn test_handle_http_error_auth() {
        let err = handle_http_error(401, "unauthorized", "Pinecone");
        assert!(matches!(err, Error::Authentication(_)));
        let err = handle_http_error(403, "forbidden", "OpenAI");
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_handle_http_error_other() {
        let err = handle_http_error(500, "internal error", "Pinecone");
        assert!(matches!(err, Error::Service { status: 500, .. }));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://api.pinecone.io").is_ok());
        assert!(validate_url("http://localhost:5080").is_ok());
        assert!(validate_url("ftp://files.example.com").is_err());
        assert!(validate_url("https://").is_err());
    }

    #[test]
    fn test_host_url_adds_scheme() {
        assert_eq!(
            host_url("docs-abc123.svc.aped-4627-b74a.pinecone.io"),
            "https://docs-abc123.svc.aped-4627-b74a.pinecone.io"
        );
        assert_eq!(host_url("http://127.0.0.1:5081/"), "http://127.0.0.1:5081");
    }
}
