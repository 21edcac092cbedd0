//! Shop Context Middleware
//!
//! Every endpoint (spec.md §6) carries `shop` explicitly as a query
//! parameter (GETs) or a JSON body field (POSTs), so it is never resolved
//! authoritatively by middleware the way a header/subdomain/JWT-derived
//! tenant would be. This middleware only does best-effort enrichment of
//! the request's `RequestContext.shop` for logging/tracing, by reading the
//! `shop` query-string parameter when present; it never blocks a request
//! for lacking one; each handler's own extractor remains the source of
//! truth for business logic.

use axum::{extract::Request, middleware::Next, response::Response};
use engine_core::error::RequestContext;

/// Best-effort enrichment of the request's logging context with `shop`,
/// read from the query string. POST endpoints carry `shop` in the JSON
/// body instead and are read directly by their handlers, so this never
/// sees it — that's expected, not a bug.
pub async fn shop_context_middleware(mut request: Request, next: Next) -> Response {
    if let Some(shop) = extract_shop_from_query(request.uri().query()) {
        if let Some(context) = request.extensions_mut().get_mut::<RequestContext>() {
            *context = context.clone().with_shop(shop);
        }
    }

    next.run(request).await
}

fn extract_shop_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let key = parts.next()?;
        if key == "shop" {
            let value = parts.next().unwrap_or_default();
            if value.is_empty() {
                return None;
            }
            return Some(
                urlencoding_decode(value),
            );
        }
    }
    None
}

/// Minimal percent-decoding for the `shop` query parameter; shop hosts
/// are plain hostnames and never contain characters requiring full
/// `application/x-www-form-urlencoded` handling beyond `%XX` escapes.
fn urlencoding_decode(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hi = chars.next();
            let lo = chars.next();
            if let (Some(hi), Some(lo)) = (hi, lo) {
                if let Ok(byte) = u8::from_str_radix(&format!("{hi}{lo}"), 16) {
                    result.push(byte as char);
                    continue;
                }
            }
            result.push('%');
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_shop_from_query() {
        assert_eq!(
            extract_shop_from_query(Some("shop=demo.example.com")),
            Some("demo.example.com".to_string())
        );
    }

    #[test]
    fn ignores_missing_shop() {
        assert_eq!(extract_shop_from_query(Some("session_id=abc")), None);
        assert_eq!(extract_shop_from_query(None), None);
    }

    #[test]
    fn decodes_percent_encoded_shop() {
        assert_eq!(
            extract_shop_from_query(Some("shop=demo%2Eexample%2Ecom")),
            Some("demo.example.com".to_string())
        );
    }
}
