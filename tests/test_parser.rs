use expressway::http::headers::Headers;
use expressway::http::method::Method;
use expressway::http::parser::{ParseError, body_length, parse_request_head};
use expressway::http::status::StatusCode;

const MAX_HEAD: usize = 16384;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_request_head(req, MAX_HEAD).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.target, "/");
    assert_eq!(parsed.minor_version, 1);
    assert_eq!(parsed.headers.get("Host"), Some("example.com"));
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_leaves_body_unconsumed() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_request_head(req, MAX_HEAD).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.target, "/api");
    assert_eq!(&req[consumed..], b"hello");
    assert_eq!(body_length(&parsed.headers, 1024), Ok(5));
}

#[test]
fn test_parse_multiple_headers() {
    let req = b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (parsed, _) = parse_request_head(req, MAX_HEAD).unwrap();

    assert_eq!(parsed.headers.get("host"), Some("example.com"));
    assert_eq!(parsed.headers.get("user-agent"), Some("test-client"));
    assert_eq!(parsed.headers.get("ACCEPT"), Some("*/*"));
    assert_eq!(parsed.headers.len(), 3);
}

#[test]
fn test_repeated_headers_keep_every_value() {
    let req = b"GET / HTTP/1.1\r\nAccept: text/html\r\naccept: application/json\r\n\r\n";
    let (parsed, _) = parse_request_head(req, MAX_HEAD).unwrap();

    assert_eq!(
        parsed.headers.get_all("Accept"),
        ["text/html".to_string(), "application/json".to_string()]
    );
}

#[test]
fn test_parse_request_target_keeps_query() {
    let req = b"GET /search?q=rust HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, _) = parse_request_head(req, MAX_HEAD).unwrap();

    assert_eq!(parsed.target, "/search?q=rust");
}

#[test]
fn test_parse_http_1_0() {
    let (parsed, _) = parse_request_head(b"GET / HTTP/1.0\r\n\r\n", MAX_HEAD).unwrap();
    assert_eq!(parsed.minor_version, 0);
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    assert_eq!(parse_request_head(req, MAX_HEAD).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_parse_incomplete_request_line() {
    assert_eq!(parse_request_head(b"GE", MAX_HEAD).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_incomplete_head_over_limit() {
    let req = b"GET / HTTP/1.1\r\nX-Filler: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    assert_eq!(parse_request_head(req, 16).unwrap_err(), ParseError::HeadersTooLarge(16));
}

#[test]
fn test_complete_head_over_limit() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    assert_eq!(parse_request_head(req, 20).unwrap_err(), ParseError::HeadersTooLarge(20));
}

#[test]
fn test_unknown_method() {
    let err = parse_request_head(b"BREW / HTTP/1.1\r\n\r\n", MAX_HEAD).unwrap_err();

    assert_eq!(err, ParseError::UnknownMethod("BREW".to_string()));
    assert_eq!(err.status(), Some(StatusCode::MethodNotAllowed));
}

#[test]
fn test_unsupported_version() {
    let err = parse_request_head(b"GET / HTTP/2.0\r\n\r\n", MAX_HEAD).unwrap_err();

    assert_eq!(err, ParseError::UnsupportedVersion);
    assert_eq!(err.status(), Some(StatusCode::HttpVersionNotSupported));
}

#[test]
fn test_malformed_header() {
    let err = parse_request_head(b"GET / HTTP/1.1\r\nBad Header\r\n\r\n", MAX_HEAD).unwrap_err();

    assert!(matches!(err, ParseError::Malformed(_)));
    assert_eq!(err.status(), Some(StatusCode::BadRequest));
}

#[test]
fn test_incomplete_has_no_status() {
    assert_eq!(ParseError::Incomplete.status(), None);
}

#[test]
fn test_body_length_absent() {
    assert_eq!(body_length(&Headers::new(), 10), Ok(0));
}

#[test]
fn test_body_length_rejects_garbage() {
    let mut headers = Headers::new();
    headers.set("Content-Length", "12abc");

    let err = body_length(&headers, 1024).unwrap_err();
    assert_eq!(err, ParseError::InvalidContentLength);
    assert_eq!(err.status(), Some(StatusCode::LengthRequired));
}

#[test]
fn test_body_length_rejects_repeats() {
    let mut headers = Headers::new();
    headers.append("Content-Length", "3");
    headers.append("Content-Length", "3");

    assert_eq!(body_length(&headers, 1024), Err(ParseError::InvalidContentLength));
}

#[test]
fn test_body_length_over_limit() {
    let mut headers = Headers::new();
    headers.set("Content-Length", "1000000000000");

    let err = body_length(&headers, 10 * 1024 * 1024).unwrap_err();
    assert_eq!(
        err,
        ParseError::BodyTooLarge {
            length: 1_000_000_000_000,
            max: 10 * 1024 * 1024
        }
    );
    assert_eq!(err.status(), Some(StatusCode::ContentTooLarge));
}
