//! Request helpers shared by the portal.

/// Extract the first client IP from an X-Forwarded-For header value.
///
/// The leftmost address is the original client. The header is set by the
/// client and can be forged, so the result is for audit entries only and
/// never for authorization.
pub fn extract_client_ip(forwarded_for: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract a bearer token from an `Authorization` header value.
pub fn extract_bearer_token(authorization: Option<&str>) -> Option<String> {
    let value = authorization?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Find a cookie value by name in a `Cookie` header value.
pub fn extract_cookie(cookie_header: Option<&str>, name: &str) -> Option<String> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}
