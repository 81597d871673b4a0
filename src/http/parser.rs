use thiserror::Error;

use crate::http::headers::Headers;
use crate::http::method::Method;
use crate::http::status::StatusCode;

/// Upper bound on header lines in one request head.
const MAX_HEADERS: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("request head is incomplete")]
    Incomplete,
    #[error("request head exceeds {0} bytes")]
    HeadersTooLarge(usize),
    #[error("malformed request head: {0}")]
    Malformed(String),
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("unsupported HTTP version")]
    UnsupportedVersion,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("Content-Length {length} exceeds {max}")]
    BodyTooLarge { length: u64, max: u64 },
}

impl ParseError {
    /// Status code a synthesized error request carries, if this error
    /// terminates the request rather than asking for more bytes.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ParseError::Incomplete => None,
            ParseError::HeadersTooLarge(_) => Some(StatusCode::ContentTooLarge),
            ParseError::Malformed(_) => Some(StatusCode::BadRequest),
            ParseError::UnknownMethod(_) => Some(StatusCode::MethodNotAllowed),
            ParseError::UnsupportedVersion => Some(StatusCode::HttpVersionNotSupported),
            ParseError::InvalidContentLength => Some(StatusCode::LengthRequired),
            ParseError::BodyTooLarge { .. } => Some(StatusCode::ContentTooLarge),
        }
    }
}

/// Request line and headers of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHead {
    pub method: Method,
    /// Raw request target, query included.
    pub target: String,
    pub minor_version: u8,
    pub headers: Headers,
}

/// Parses one request head from the start of `buf`.
///
/// On success returns the head and the number of bytes it occupied, so the
/// body (if any) starts at that offset. `Incomplete` means `buf` ends
/// inside the head and the caller should retain it; once the retained
/// bytes exceed `max_header_size` the head is rejected as too large.
pub fn parse_request_head(
    buf: &[u8],
    max_header_size: usize,
) -> Result<(RequestHead, usize), ParseError> {
    let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut raw_headers);

    let consumed = match req.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            if buf.len() > max_header_size {
                return Err(ParseError::HeadersTooLarge(max_header_size));
            }
            return Err(ParseError::Incomplete);
        }
        Err(httparse::Error::Version) => return Err(ParseError::UnsupportedVersion),
        Err(e) => return Err(ParseError::Malformed(e.to_string())),
    };

    if consumed > max_header_size {
        return Err(ParseError::HeadersTooLarge(max_header_size));
    }

    let token = req.method.unwrap_or_default();
    let method =
        Method::from_str(token).ok_or_else(|| ParseError::UnknownMethod(token.to_string()))?;

    let minor_version = match req.version {
        Some(v @ (0 | 1)) => v,
        _ => return Err(ParseError::UnsupportedVersion),
    };

    let mut headers = Headers::new();
    for h in req.headers.iter() {
        headers.append(h.name, String::from_utf8_lossy(h.value).trim());
    }

    let head = RequestHead {
        method,
        target: req.path.unwrap_or("/").to_string(),
        minor_version,
        headers,
    };

    Ok((head, consumed))
}

/// Declared body length of a request, `0` when `Content-Length` is absent.
///
/// Repeated or non-numeric values are rejected, as is any length above
/// `max`.
pub fn body_length(headers: &Headers, max: u64) -> Result<u64, ParseError> {
    let length = match headers.get_all("Content-Length") {
        [] => return Ok(0),
        [value] => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidContentLength)?,
        _ => return Err(ParseError::InvalidContentLength),
    };

    if length > max {
        return Err(ParseError::BodyTooLarge { length, max });
    }

    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_request_head(req, 16384).unwrap();

        assert_eq!(parsed.method, Method::GET);
        assert_eq!(parsed.target, "/");
        assert_eq!(parsed.headers.get("host"), Some("example.com"));
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn partial_head_over_limit_is_too_large() {
        let req = b"GET / HTTP/1.1\r\nX-Long: aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

        assert_eq!(parse_request_head(req, 1024), Err(ParseError::Incomplete));
        assert_eq!(
            parse_request_head(req, 16),
            Err(ParseError::HeadersTooLarge(16))
        );
    }

    #[test]
    fn body_length_rules() {
        let mut headers = Headers::new();
        assert_eq!(body_length(&headers, 10), Ok(0));

        headers.set("Content-Length", "7");
        assert_eq!(body_length(&headers, 10), Ok(7));
        assert_eq!(
            body_length(&headers, 5),
            Err(ParseError::BodyTooLarge { length: 7, max: 5 })
        );

        headers.append("content-length", "7");
        assert_eq!(
            body_length(&headers, 10),
            Err(ParseError::InvalidContentLength)
        );
    }
}
