//! # Request ID Middleware
//!
//! Generates or extracts a unique request identifier for every inbound
//! request, so a single operation can be traced through logs end to end.
//!
//! ## Supported Headers
//!
//! Recognized in priority order: `x-request-id`, `x-correlation-id`,
//! `x-trace-id`, `request-id`.
//!
//! ## Client IP Detection
//!
//! Real client IPs are extracted from proxy headers:
//! - `x-forwarded-for` (preferred, uses first IP)
//! - `x-real-ip`
//! - `cf-connecting-ip` (Cloudflare)
//! - `x-client-ip`

use axum::{
    extract::Request,
    http::{header::HeaderValue, HeaderName, StatusCode},
    middleware::Next,
    response::Response,
};
use engine_core::error::RequestContext;
use std::str::FromStr;
use tracing::{debug, Span};
use uuid::Uuid;

/// Request ID header name used for client communication.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID middleware configuration and utilities.
pub struct RequestIdMiddleware {
    /// Custom request ID header name (defaults to x-request-id)
    pub header_name: String,
    /// Whether to validate request ID format strictly
    pub strict_validation: bool,
    /// Whether to generate request IDs if none provided
    pub auto_generate: bool,
}

impl RequestIdMiddleware {
    /// Create a new RequestIdMiddleware with default configuration
    pub fn new() -> Self {
        Self {
            header_name: REQUEST_ID_HEADER.to_string(),
            strict_validation: true,
            auto_generate: true,
        }
    }

    /// Create middleware with custom header name
    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    /// Enable or disable strict validation of request IDs
    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Enable or disable automatic generation of request IDs
    pub fn with_auto_generate(mut self, auto_generate: bool) -> Self {
        self.auto_generate = auto_generate;
        self
    }

    /// Extract request ID using this middleware's configuration
    pub fn extract_request_id(&self, request: &Request) -> Option<String> {
        if let Some(value) = request.headers().get(&self.header_name) {
            if let Ok(id_str) = value.to_str() {
                if !self.strict_validation || is_valid_request_id(id_str) {
                    return Some(id_str.to_string());
                }
            }
        }

        if self.auto_generate {
            Some(Uuid::new_v4().to_string())
        } else {
            None
        }
    }

    /// Check if a request has a valid request ID
    pub fn has_valid_request_id(&self, request: &Request) -> bool {
        if let Some(value) = request.headers().get(&self.header_name) {
            if let Ok(id_str) = value.to_str() {
                return !self.strict_validation || is_valid_request_id(id_str);
            }
        }
        false
    }
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware function that handles request ID generation and injection
pub async fn request_id_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let request_id = extract_or_generate_request_id(&request);

    let request_context = RequestContext::new().with_request_id(request_id.clone());
    let request_context = enrich_request_context(request_context, &request);

    request.extensions_mut().insert(request_context.clone());

    let span = Span::current();
    span.record("request_id", &request_id);

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_str(REQUEST_ID_HEADER).unwrap(), header_value);
    }

    debug!(
        request_id = %request_id,
        status = %response.status(),
        "Request completed"
    );

    Ok(response)
}

/// Extract request ID from headers or generate a new one
fn extract_or_generate_request_id(request: &Request) -> String {
    let possible_headers = [REQUEST_ID_HEADER, "x-correlation-id", "x-trace-id", "request-id"];

    for header_name in &possible_headers {
        if let Some(value) = request.headers().get(*header_name) {
            if let Ok(id_str) = value.to_str() {
                if is_valid_request_id(id_str) {
                    debug!("Using existing request ID from header {}: {}", header_name, id_str);
                    return id_str.to_string();
                }
            }
        }
    }

    let new_id = Uuid::new_v4().to_string();
    debug!("Generated new request ID: {}", new_id);
    new_id
}

/// Enrich request context with the client IP, when detectable. The shop
/// the request concerns is carried as an explicit query/body parameter on
/// every endpoint (spec.md §6), so it is attached later by
/// `shop_context_middleware` rather than here.
fn enrich_request_context(mut context: RequestContext, request: &Request) -> RequestContext {
    if let Some(ip) = extract_client_ip(request) {
        context = context.with_source_ip(ip);
    }

    context
}

/// Extract client IP from various headers
fn extract_client_ip(request: &Request) -> Option<String> {
    let ip_headers = [
        "x-forwarded-for",
        "x-real-ip",
        "cf-connecting-ip", // Cloudflare
        "x-client-ip",
        "x-forwarded",
        "forwarded-for",
        "forwarded",
    ];

    for header_name in &ip_headers {
        if let Some(value) = request.headers().get(*header_name) {
            if let Ok(ip_str) = value.to_str() {
                let ip = if header_name == &"x-forwarded-for" {
                    ip_str.split(',').next().unwrap_or(ip_str).trim()
                } else {
                    ip_str.trim()
                };

                if is_valid_ip(ip) {
                    return Some(ip.to_string());
                }
            }
        }
    }

    None
}

/// Validate that a string is a valid request ID
fn is_valid_request_id(id: &str) -> bool {
    if Uuid::from_str(id).is_ok() {
        return true;
    }

    id.len() <= 128 && id.len() >= 8 && id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Simple IP validation
fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<std::net::IpAddr>().is_ok()
}

/// Extension trait to easily get request ID / context from extensions.
pub trait RequestIdExt {
    /// Get the request ID if available in the request extensions
    fn request_id(&self) -> Option<&str>;

    /// Get the full request context if available in the request extensions
    fn request_context(&self) -> Option<&RequestContext>;

    /// Get the source IP address from the request context
    fn source_ip(&self) -> Option<&str>;
}

impl RequestIdExt for Request {
    fn request_id(&self) -> Option<&str> {
        self.extensions().get::<RequestContext>().map(|ctx| ctx.request_id.as_str())
    }

    fn request_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }

    fn source_ip(&self) -> Option<&str> {
        self.extensions().get::<RequestContext>().and_then(|ctx| ctx.source_ip.as_deref())
    }
}

/// Helper macro for logging with request ID
#[macro_export]
macro_rules! log_with_request_id {
    ($request:expr, $level:ident, $($args:tt)*) => {
        if let Some(request_id) = $request.request_id() {
            tracing::$level!(request_id = request_id, $($args)*);
        } else {
            tracing::$level!($($args)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_generation() {
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let request_id = response.headers().get(REQUEST_ID_HEADER);
        assert!(request_id.is_some());

        let request_id_str = request_id.unwrap().to_str().unwrap();
        assert!(is_valid_request_id(request_id_str));
    }

    #[tokio::test]
    async fn test_existing_request_id_preserved() {
        let existing_id = "test-request-id-12345";

        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(REQUEST_ID_HEADER, existing_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let returned_id = response.headers().get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();

        assert_eq!(returned_id, existing_id);
    }

    #[test]
    fn test_valid_request_id() {
        assert!(is_valid_request_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_request_id("test-request-123"));
        assert!(is_valid_request_id("abc_123_def"));
        assert!(!is_valid_request_id("abc"));

        let too_long = "a".repeat(129);
        assert!(!is_valid_request_id(&too_long));
        assert!(!is_valid_request_id("test@request.id"));
    }

    #[test]
    fn test_ip_validation() {
        assert!(is_valid_ip("192.168.1.1"));
        assert!(is_valid_ip("10.0.0.1"));
        assert!(is_valid_ip("2001:db8::1"));
        assert!(!is_valid_ip("not.an.ip"));
        assert!(!is_valid_ip("999.999.999.999"));
    }

    #[test]
    fn test_client_ip_extraction() {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.1, 70.41.3.18, 150.172.238.178")
            .body(Body::empty())
            .unwrap();

        let ip = extract_client_ip(&request);
        assert_eq!(ip, Some("203.0.113.1".to_string()));
    }
}
