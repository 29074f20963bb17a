use axum::http::HeaderMap;

// Shared bucket for callers we can't trace
pub const UNKNOWN_CLIENT: &str = "unknown";

// Best-effort client identifier from proxy headers.
// Precedence: x-forwarded-for (first hop) -> x-real-ip -> cf-connecting-ip -> "unknown"
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim);

    forwarded
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .or_else(|| header_str(headers, "cf-connecting-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
