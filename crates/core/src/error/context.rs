use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Context information for errors, carried through for debugging and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub error_id: String,
    pub request_id: Option<String>,
    pub shop: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub trace: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            error_id: Uuid::new_v4().to_string(),
            request_id: None,
            shop: None,
            metadata: HashMap::new(),
            trace: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_shop(mut self, shop: impl Into<String>) -> Self {
        self.shop = Some(shop.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace.push(trace.into());
        self
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request context, threaded through handlers for correlation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub shop: Option<String>,
    pub source_ip: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            shop: None,
            source_ip: None,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_shop(mut self, shop: impl Into<String>) -> Self {
        self.shop = Some(shop.into());
        self
    }

    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }

    pub fn to_error_context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new().with_request_id(self.request_id.clone());
        if let Some(shop) = &self.shop {
            ctx = ctx.with_shop(shop.clone());
        }
        if let Some(ip) = &self.source_ip {
            ctx.add_metadata("source_ip", serde_json::Value::String(ip.clone()));
        }
        ctx
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
