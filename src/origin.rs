use axum::http::{header, HeaderMap, HeaderValue};

/// Exact, case-sensitive comparison of the `origin` header against the single
/// allowed value. Browsers set this header themselves; any other client can
/// forge it, so this only keeps casual cross-site use out.
pub fn origin_allowed(headers: &HeaderMap, allowed: &HeaderValue) -> bool {
    headers
        .get(header::ORIGIN)
        .map(|origin| !origin.is_empty() && origin == allowed)
        .unwrap_or(false)
}

/// Rate-limit key: first entry of `x-forwarded-for`, or `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> HeaderValue {
        HeaderValue::from_static("https://shop.example")
    }

    fn with_header(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_exact_origin() {
        assert!(origin_allowed(
            &with_header("origin", "https://shop.example"),
            &allowed()
        ));
    }

    #[test]
    fn rejects_missing_or_different_origin() {
        assert!(!origin_allowed(&HeaderMap::new(), &allowed()));
        assert!(!origin_allowed(&with_header("origin", ""), &allowed()));
        assert!(!origin_allowed(
            &with_header("origin", "https://evil.example"),
            &allowed()
        ));
        assert!(!origin_allowed(
            &with_header("origin", "https://shop.example/"),
            &allowed()
        ));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert!(!origin_allowed(
            &with_header("origin", "https://SHOP.example"),
            &allowed()
        ));
    }

    #[test]
    fn client_ip_takes_first_forwarded_entry() {
        let headers = with_header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1");
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn client_ip_defaults_to_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
