//! HTTP Range request handling for media streaming.
//!
//! Implements the `bytes=start-end` subset of RFC 7233 the BooServer
//! clients use: a valid in-bounds range yields 206 Partial Content with a
//! Content-Range header, anything malformed or unsatisfiable yields 416
//! with a structured error body, and the absence of a Range header yields
//! the full body.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde_json::json;

/// Extracts the raw Range header value, if one is present and readable.
pub fn extract_range_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("range")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Parses a `bytes=start-end` header into `(start, Some(end))`, or
/// `(start, None)` for the open-ended `bytes=start-` form. Returns `None`
/// for anything malformed.
pub fn parse_range_header(raw: &str) -> Option<(u64, Option<u64>)> {
    let spec = raw.strip_prefix("bytes=")?;
    let (start_str, end_str) = spec.split_once('-')?;
    let start = start_str.parse::<u64>().ok()?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(end_str.parse::<u64>().ok()?)
    };
    Some((start, end))
}

/// Validates a parsed range against the total size, clamping an oversized
/// end. Returns `(start, end, length)` or `None` when unsatisfiable.
pub fn validate_range(start: u64, end: Option<u64>, total_size: u64) -> Option<(u64, u64, u64)> {
    if start >= total_size {
        return None;
    }
    let end = end.unwrap_or(total_size - 1).min(total_size - 1);
    if end < start {
        return None;
    }
    Some((start, end, end - start + 1))
}

/// Builds the success response: 206 with a Content-Range when `partial`
/// carries the served range, plain 200 otherwise.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if response building fails
pub fn build_range_response(
    data: Vec<u8>,
    content_type: &str,
    partial: Option<(u64, u64, u64)>,
) -> Result<Response<Body>, StatusCode> {
    let mut response = Response::builder()
        .header("Content-Type", content_type)
        .header("Accept-Ranges", "bytes")
        .header("Content-Length", data.len().to_string());

    response = match partial {
        Some((start, end, total_size)) => response
            .status(StatusCode::PARTIAL_CONTENT)
            .header("Content-Range", format!("bytes {start}-{end}/{total_size}")),
        None => response.status(StatusCode::OK),
    };

    response
        .body(Body::from(data))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Builds the 416 response for a malformed or unsatisfiable range.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if response building fails
pub fn range_not_satisfiable(total_size: u64) -> Result<Response<Body>, StatusCode> {
    let body = json!({
        "error": "requested range not satisfiable",
        "size": total_size,
    });
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header("Content-Type", "application/json")
        .header("Content-Range", format!("bytes */{total_size}"))
        .body(Body::from(body.to_string()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header_closed() {
        assert_eq!(parse_range_header("bytes=100-199"), Some((100, Some(199))));
    }

    #[test]
    fn test_parse_range_header_open_end() {
        assert_eq!(parse_range_header("bytes=500-"), Some((500, None)));
    }

    #[test]
    fn test_parse_range_header_malformed() {
        assert_eq!(parse_range_header("invalid"), None);
        assert_eq!(parse_range_header("bytes=abc-"), None);
        assert_eq!(parse_range_header("bytes=100"), None);
        assert_eq!(parse_range_header("bytes=-500"), None);
    }

    #[test]
    fn test_validate_range_in_bounds() {
        assert_eq!(validate_range(100, Some(199), 1_000_000), Some((100, 199, 100)));
    }

    #[test]
    fn test_validate_range_clamps_end() {
        assert_eq!(validate_range(100, Some(9999), 500), Some((100, 499, 400)));
        assert_eq!(validate_range(500, None, 1000), Some((500, 999, 500)));
    }

    #[test]
    fn test_validate_range_past_the_end_is_unsatisfiable() {
        assert_eq!(validate_range(2_000_000, None, 1_000_000), None);
        assert_eq!(validate_range(1000, Some(999), 1000), None);
        assert_eq!(validate_range(200, Some(100), 1000), None);
    }

    #[test]
    fn test_range_response_headers() {
        let response = build_range_response(vec![0u8; 100], "video/mp4", Some((100, 199, 1_000_000)))
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let headers = response.headers();
        assert_eq!(headers["Content-Range"], "bytes 100-199/1000000");
        assert_eq!(headers["Content-Length"], "100");
        assert_eq!(headers["Content-Type"], "video/mp4");
    }

    #[test]
    fn test_full_response_headers() {
        let response = build_range_response(vec![0u8; 64], "image/png", None).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["Content-Length"], "64");
        assert!(response.headers().get("Content-Range").is_none());
    }

    #[test]
    fn test_not_satisfiable_response() {
        let response = range_not_satisfiable(1_000_000).unwrap();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()["Content-Range"], "bytes */1000000");
    }
}
