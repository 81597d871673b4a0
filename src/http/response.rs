use std::cell::RefCell;
use std::rc::Rc;
use std::time::SystemTime;

use crate::config::HttpConfig;
use crate::http::cookie::Cookie;
use crate::http::headers::Headers;
use crate::http::status::reason_phrase;
use crate::http::writer::{LAST_CHUNK, Wire, encode_chunk, serialize_head};

/// Callback run when a response ends or is torn down.
pub type Completion = Box<dyn FnOnce()>;

struct ResponseInner {
    status: u16,
    minor_version: u8,
    headers: Headers,
    cookies: Vec<(String, Cookie)>,
    headers_sent: bool,
    chunked: bool,
    /// Body runs until the connection closes.
    close_delimited: bool,
    alive: bool,
    /// Set once routing has reached its first middleware.
    handled: bool,
    completion: Option<Completion>,
}

/// The response half of one exchange.
///
/// Like [`Request`](crate::http::request::Request) this is a shared
/// handle. Headers can be changed until they are sent; after `end` (or
/// once the connection drops the exchange) every call is a no-op.
#[derive(Clone)]
pub struct Response {
    inner: Rc<RefCell<ResponseInner>>,
    wire: Rc<Wire>,
    config: Rc<HttpConfig>,
}

impl Response {
    pub(crate) fn new(config: Rc<HttpConfig>, wire: Rc<Wire>, minor_version: u8, status: u16) -> Self {
        let mut headers = Headers::new();
        headers.set("Date", httpdate::fmt_http_date(SystemTime::now()));
        headers.set("Content-Type", "text/plain; charset=utf-8");

        if config.persistent_connections {
            headers.set("Connection", "keep-alive");
            headers.set(
                "Keep-Alive",
                format!(
                    "timeout={}, max={}",
                    config.keep_alive_timeout_ms / 1000,
                    config.max_requests_per_connection
                ),
            );
        } else {
            headers.set("Connection", "close");
        }

        Self {
            inner: Rc::new(RefCell::new(ResponseInner {
                status,
                minor_version,
                headers,
                cookies: Vec::new(),
                headers_sent: false,
                chunked: false,
                close_delimited: false,
                alive: true,
                handled: false,
                completion: None,
            })),
            wire,
            config,
        }
    }

    pub fn status(&self, code: u16) -> &Self {
        let mut inner = self.inner.borrow_mut();
        if inner.alive && !inner.headers_sent {
            inner.status = code;
        }
        self
    }

    pub fn status_code(&self) -> u16 {
        self.inner.borrow().status
    }

    pub fn set_header(&self, name: &str, value: impl Into<String>) -> &Self {
        self.with_headers(|h| h.set(name, value));
        self
    }

    pub fn set_header_values(&self, name: &str, values: Vec<String>) -> &Self {
        self.with_headers(|h| h.set_all(name, values));
        self
    }

    pub fn append_header(&self, name: &str, value: impl Into<String>) -> &Self {
        self.with_headers(|h| h.append(name, value));
        self
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.borrow().headers.get(name).map(str::to_string)
    }

    pub fn header_all(&self, name: &str) -> Vec<String> {
        self.inner.borrow().headers.get_all(name).to_vec()
    }

    /// Sets cookie `name`, replacing an earlier one of the same name.
    pub fn cookie(&self, name: &str, cookie: Cookie) -> &Self {
        let mut inner = self.inner.borrow_mut();
        if !inner.alive || inner.headers_sent {
            return self;
        }
        match inner.cookies.iter().position(|(n, _)| n == name) {
            Some(i) => inner.cookies[i].1 = cookie,
            None => inner.cookies.push((name.to_string(), cookie)),
        }
        self
    }

    /// Tells the client to drop cookie `name`; `Domain` and `Path` of
    /// `cookie` are kept so the right cookie is matched.
    pub fn clear_cookie(&self, name: &str, cookie: Cookie) -> &Self {
        self.cookie(name, cookie.cleared())
    }

    pub fn headers_sent(&self) -> bool {
        self.inner.borrow().headers_sent
    }

    pub fn is_alive(&self) -> bool {
        self.inner.borrow().alive
    }

    /// Writes a body chunk, sending headers first if needed.
    ///
    /// The first write on a persistent HTTP/1.1 connection switches the
    /// response to chunked framing. Otherwise the body runs until the
    /// connection closes, and an HTTP/1.0 exchange gives up keep-alive.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        if !self.is_alive() {
            return;
        }
        if !self.headers_sent() {
            {
                let mut inner = self.inner.borrow_mut();
                if self.config.persistent_connections && inner.minor_version >= 1 {
                    inner.chunked = true;
                } else {
                    inner.close_delimited = true;
                    inner.headers.set("Connection", "close");
                    inner.headers.remove("Keep-Alive");
                }
            }
            self.send_headers(None);
        }
        self.write_body(data.as_ref());
    }

    /// Sends `data` as the whole body and ends the response.
    pub fn send(&self, data: impl AsRef<[u8]>) {
        if !self.is_alive() {
            return;
        }
        let data = data.as_ref();
        if !self.headers_sent() {
            self.send_headers(Some(data.len()));
        }
        self.write_body(data);
        self.end();
    }

    /// Sets `code` and sends its reason phrase as the body.
    pub fn send_status(&self, code: u16) {
        if !self.is_alive() {
            return;
        }
        self.status(code);
        let reason = reason_phrase(code);
        if reason.is_empty() {
            self.send(code.to_string())
        } else {
            self.send(reason)
        }
    }

    /// Finishes the exchange.
    ///
    /// Unsent headers go out with an empty body, a chunked body gets its
    /// terminating chunk, and the completion callback runs. Calling `end`
    /// on a dead response only runs a completion that is still pending.
    pub fn end(&self) {
        if !self.is_alive() {
            self.run_completion();
            return;
        }

        if !self.headers_sent() {
            self.send_headers(Some(0));
        }
        if self.inner.borrow().chunked {
            self.wire.push(LAST_CHUNK);
        }

        self.invalidate();
        self.wire.mark_ended();
    }

    fn with_headers(&self, f: impl FnOnce(&mut Headers)) {
        let mut inner = self.inner.borrow_mut();
        if inner.alive && !inner.headers_sent {
            f(&mut inner.headers);
        }
    }

    fn send_headers(&self, content_length: Option<usize>) {
        let head = {
            let mut inner = self.inner.borrow_mut();
            if !inner.alive || inner.headers_sent {
                return;
            }

            if inner.chunked {
                inner.headers.set("Transfer-Encoding", "chunked");
            } else if let Some(len) = content_length {
                inner.headers.set("Content-Length", len.to_string());
            }

            let content_type = inner.headers.get("Content-Type").map(str::to_string);
            if let Some(ct) = content_type {
                if !ct.to_ascii_lowercase().contains("charset") {
                    inner.headers.set("Content-Type", format!("{}; charset=utf-8", ct));
                }
            }

            if !inner.cookies.is_empty() {
                let values = inner
                    .cookies
                    .iter()
                    .map(|(name, cookie)| cookie.serialize(name))
                    .collect();
                inner.headers.set_all("Set-Cookie", values);
            }

            inner.headers_sent = true;
            serialize_head(inner.minor_version, inner.status, &inner.headers)
        };

        tracing::debug!(status = self.status_code(), "response headers sent");
        self.wire.push(&head);
    }

    fn write_body(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if self.inner.borrow().chunked {
            self.wire.push(&encode_chunk(data));
        } else {
            self.wire.push(data);
        }
    }

    fn run_completion(&self) {
        let completion = self.inner.borrow_mut().completion.take();
        if let Some(done) = completion {
            done();
        }
    }

    /// Marks the response dead and runs any pending completion.
    pub(crate) fn invalidate(&self) {
        self.inner.borrow_mut().alive = false;
        self.run_completion();
    }

    pub(crate) fn take_completion(&self) -> Option<Completion> {
        self.inner.borrow_mut().completion.take()
    }

    pub(crate) fn set_completion(&self, completion: Option<Completion>) {
        self.inner.borrow_mut().completion = completion;
    }

    /// Whether the connection must close once this response is sent.
    pub(crate) fn closes_connection(&self) -> bool {
        self.inner.borrow().close_delimited
    }

    /// Returns `true` the first time it is called for this response.
    pub(crate) fn mark_handled(&self) -> bool {
        !std::mem::replace(&mut self.inner.borrow_mut().handled, true)
    }
}
