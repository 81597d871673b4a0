use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use url::Url;

use crate::http::cookie::parse_cookie_header;
use crate::http::headers::Headers;
use crate::http::method::Method;
use crate::http::parser::RequestHead;

type DataCallback = Box<dyn FnMut(Bytes)>;
type EndCallback = Box<dyn FnOnce()>;

struct RequestInner {
    method: Method,
    original_url: String,
    path: String,
    query_string: String,
    relative_path: String,
    base_path: String,
    minor_version: u8,
    protocol: String,
    headers: Headers,

    query: Option<HashMap<String, Vec<String>>>,
    cookies: Option<HashMap<String, String>>,
    params: HashMap<String, String>,
    data: HashMap<String, String>,
    error: String,

    content_length: u64,
    body_received: u64,
    body_complete: bool,
    end_fired: bool,
    pending_body: Vec<Bytes>,
    on_data: Option<DataCallback>,
    on_end: Option<EndCallback>,
    /// Bumped whenever body callbacks are dropped, so a callback running
    /// at that moment is not put back afterwards.
    callback_epoch: u32,

    alive: bool,
    request_error: Option<u16>,
}

/// One HTTP request as seen by middleware.
///
/// `Request` is a cheap handle; clones refer to the same request. Once the
/// exchange ends the request is invalidated and every setter becomes a
/// no-op, while getters keep returning the last known values.
#[derive(Clone)]
pub struct Request {
    inner: Rc<RefCell<RequestInner>>,
}

fn split_target(target: &str) -> (String, String) {
    let without_fragment = target.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (without_fragment.to_string(), String::new()),
    }
}

impl Request {
    /// Builds a request from a parsed head. `protocol` is the scheme
    /// reported by [`Request::url`].
    pub fn new(head: RequestHead, protocol: &str) -> Self {
        let (path, query_string) = split_target(&head.target);

        Self {
            inner: Rc::new(RefCell::new(RequestInner {
                method: head.method,
                original_url: head.target,
                relative_path: path.clone(),
                path,
                query_string,
                base_path: String::new(),
                minor_version: head.minor_version,
                protocol: protocol.to_string(),
                headers: head.headers,
                query: None,
                cookies: None,
                params: HashMap::new(),
                data: HashMap::new(),
                error: String::new(),
                content_length: 0,
                body_received: 0,
                body_complete: true,
                end_fired: false,
                pending_body: Vec::new(),
                on_data: None,
                on_end: None,
                callback_epoch: 0,
                alive: true,
                request_error: None,
            })),
        }
    }

    /// A request that only carries the status of a failed parse.
    pub(crate) fn failed(status: u16, minor_version: u8, protocol: &str) -> Self {
        let head = RequestHead {
            method: Method::GET,
            target: "/".to_string(),
            minor_version,
            headers: Headers::new(),
        };
        let req = Self::new(head, protocol);
        req.inner.borrow_mut().request_error = Some(status);
        req
    }

    pub fn method(&self) -> Method {
        self.inner.borrow().method
    }

    /// The request target exactly as received.
    pub fn original_url(&self) -> String {
        self.inner.borrow().original_url.clone()
    }

    /// The request target without query string or fragment.
    pub fn path(&self) -> String {
        self.inner.borrow().path.clone()
    }

    /// The part of the path left to match inside the current mount.
    pub fn relative_path(&self) -> String {
        self.inner.borrow().relative_path.clone()
    }

    /// The part of the path consumed by the most recent match.
    pub fn base_path(&self) -> String {
        self.inner.borrow().base_path.clone()
    }

    pub fn query_string(&self) -> String {
        self.inner.borrow().query_string.clone()
    }

    pub fn http_minor_version(&self) -> u8 {
        self.inner.borrow().minor_version
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.inner.borrow().headers.get(name).map(str::to_string)
    }

    pub fn header_all(&self, name: &str) -> Vec<String> {
        self.inner.borrow().headers.get_all(name).to_vec()
    }

    pub fn headers(&self) -> Headers {
        self.inner.borrow().headers.clone()
    }

    pub fn host(&self) -> Option<String> {
        self.header("Host")
    }

    /// Absolute URL of the request, if it carries a `Host` header.
    pub fn url(&self) -> Option<Url> {
        let inner = self.inner.borrow();
        let host = inner.headers.get("Host")?;
        Url::parse(&format!("{}://{}{}", inner.protocol, host, inner.original_url)).ok()
    }

    fn with_query<T>(&self, f: impl FnOnce(&HashMap<String, Vec<String>>) -> T) -> T {
        let mut inner = self.inner.borrow_mut();
        let RequestInner {
            query,
            query_string,
            ..
        } = &mut *inner;

        let parsed = query.get_or_insert_with(|| {
            let mut parsed: HashMap<String, Vec<String>> = HashMap::new();
            for (k, v) in url::form_urlencoded::parse(query_string.as_bytes()) {
                parsed.entry(k.into_owned()).or_default().push(v.into_owned());
            }
            parsed
        });
        f(parsed)
    }

    /// First value of query parameter `name`.
    pub fn query(&self, name: &str) -> Option<String> {
        self.with_query(|q| q.get(name).and_then(|vs| vs.first().cloned()))
    }

    /// Every value of query parameter `name`, in order.
    pub fn query_all(&self, name: &str) -> Vec<String> {
        self.with_query(|q| q.get(name).cloned().unwrap_or_default())
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        let mut inner = self.inner.borrow_mut();
        let RequestInner {
            cookies, headers, ..
        } = &mut *inner;

        let parsed = cookies.get_or_insert_with(|| {
            let mut all = HashMap::new();
            for line in headers.get_all("Cookie") {
                for (k, v) in parse_cookie_header(line) {
                    all.entry(k).or_insert(v);
                }
            }
            all
        });
        parsed.get(name).cloned()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.inner.borrow().params.get(name).cloned()
    }

    pub fn params(&self) -> HashMap<String, String> {
        self.inner.borrow().params.clone()
    }

    /// Value shared between middleware under `key`.
    pub fn data(&self, key: &str) -> Option<String> {
        self.inner.borrow().data.get(key).cloned()
    }

    pub fn set_data(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut inner = self.inner.borrow_mut();
        if inner.alive {
            inner.data.insert(key.into(), value.into());
        }
    }

    /// Message recorded by the most recent `Next::error`, empty otherwise.
    pub fn error(&self) -> String {
        self.inner.borrow().error.clone()
    }

    pub fn content_length(&self) -> u64 {
        self.inner.borrow().content_length
    }

    pub fn is_alive(&self) -> bool {
        self.inner.borrow().alive
    }

    /// Registers the body chunk callback. Chunks received earlier are
    /// delivered right away.
    pub fn on_data(&self, cb: impl FnMut(Bytes) + 'static) {
        let pending = {
            let mut inner = self.inner.borrow_mut();
            if !inner.alive {
                return;
            }
            inner.on_data = Some(Box::new(cb));
            std::mem::take(&mut inner.pending_body)
        };

        for chunk in pending {
            self.deliver(chunk);
        }
        self.try_fire_end();
    }

    /// Registers the end-of-body callback. It runs once, when the body is
    /// complete, the client stops sending, or the request is torn down.
    pub fn on_end(&self, cb: impl FnOnce() + 'static) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.alive || inner.end_fired {
                return;
            }
            inner.on_end = Some(Box::new(cb));
        }
        self.try_fire_end();
    }

    fn deliver(&self, chunk: Bytes) {
        let (cb, epoch) = {
            let mut inner = self.inner.borrow_mut();
            (inner.on_data.take(), inner.callback_epoch)
        };

        match cb {
            Some(mut cb) => {
                cb(chunk);
                let mut inner = self.inner.borrow_mut();
                if inner.on_data.is_none() && inner.callback_epoch == epoch {
                    inner.on_data = Some(cb);
                }
            }
            None => self.inner.borrow_mut().pending_body.push(chunk),
        }
    }

    fn try_fire_end(&self) {
        let cb = {
            let mut inner = self.inner.borrow_mut();
            if inner.end_fired || !inner.body_complete || !inner.pending_body.is_empty() {
                return;
            }
            match inner.on_end.take() {
                Some(cb) => {
                    inner.end_fired = true;
                    cb
                }
                None => return,
            }
        };
        cb();
    }

    pub(crate) fn set_content_length(&self, length: u64) {
        let mut inner = self.inner.borrow_mut();
        inner.content_length = length;
        inner.body_complete = length == 0;
    }

    /// Bytes still expected for the body.
    pub(crate) fn body_remaining(&self) -> u64 {
        let inner = self.inner.borrow();
        inner.content_length.saturating_sub(inner.body_received)
    }

    pub(crate) fn handle_data(&self, chunk: Bytes) {
        let alive = {
            let mut inner = self.inner.borrow_mut();
            inner.body_received += chunk.len() as u64;
            inner.alive
        };
        if alive && !chunk.is_empty() {
            self.deliver(chunk);
        }
    }

    pub(crate) fn handle_data_end(&self) {
        self.inner.borrow_mut().body_complete = true;
        self.try_fire_end();
    }

    pub(crate) fn clear_body_callbacks(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.on_data = None;
        inner.on_end = None;
        inner.callback_epoch = inner.callback_epoch.wrapping_add(1);
    }

    /// Ends the request's lifetime. A pending end callback still runs.
    pub(crate) fn invalidate(&self) {
        let cb = {
            let mut inner = self.inner.borrow_mut();
            if !inner.alive {
                return;
            }
            inner.alive = false;
            inner.on_data = None;
            inner.pending_body.clear();
            inner.callback_epoch = inner.callback_epoch.wrapping_add(1);
            if inner.end_fired {
                None
            } else {
                inner.end_fired = true;
                inner.on_end.take()
            }
        };
        if let Some(cb) = cb {
            cb();
        }
    }

    pub(crate) fn request_error(&self) -> Option<u16> {
        self.inner.borrow().request_error
    }

    pub(crate) fn set_request_error(&self, status: u16) {
        self.inner.borrow_mut().request_error = Some(status);
    }

    pub(crate) fn set_error(&self, message: impl Into<String>) {
        self.inner.borrow_mut().error = message.into();
    }

    pub(crate) fn set_params(&self, params: HashMap<String, String>) {
        self.inner.borrow_mut().params = params;
    }

    pub(crate) fn set_base_path(&self, base: impl Into<String>) {
        self.inner.borrow_mut().base_path = base.into();
    }

    pub(crate) fn set_relative_path(&self, path: impl Into<String>) {
        self.inner.borrow_mut().relative_path = path.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn request(target: &str, headers: &[(&str, &str)]) -> Request {
        let mut h = Headers::new();
        for (k, v) in headers {
            h.append(*k, *v);
        }
        Request::new(
            RequestHead {
                method: Method::POST,
                target: target.to_string(),
                minor_version: 1,
                headers: h,
            },
            "http",
        )
    }

    #[test]
    fn target_is_split_into_path_and_query() {
        let req = request("/search?q=rust%20lang&tag=a&tag=b#top", &[]);

        assert_eq!(req.path(), "/search");
        assert_eq!(req.relative_path(), "/search");
        assert_eq!(req.query_string(), "q=rust%20lang&tag=a&tag=b");
        assert_eq!(req.query("q").as_deref(), Some("rust lang"));
        assert_eq!(req.query_all("tag"), vec!["a", "b"]);
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn url_needs_host() {
        let req = request("/a?b=1", &[("Host", "example.com:8080")]);
        let url = req.url().unwrap();

        assert_eq!(url.as_str(), "http://example.com:8080/a?b=1");
        assert!(request("/", &[]).url().is_none());
    }

    #[test]
    fn cookies_from_every_cookie_header() {
        let req = request("/", &[("Cookie", "a=1; b=2"), ("Cookie", "c=3")]);

        assert_eq!(req.cookie("b").as_deref(), Some("2"));
        assert_eq!(req.cookie("c").as_deref(), Some("3"));
        assert_eq!(req.cookie("d"), None);
    }

    #[test]
    fn body_buffered_until_listener_registers() {
        let req = request("/", &[]);
        req.set_content_length(6);
        req.handle_data(Bytes::from_static(b"abc"));
        req.handle_data(Bytes::from_static(b"def"));
        req.handle_data_end();

        let body = Rc::new(RefCell::new(Vec::new()));
        let ended = Rc::new(Cell::new(0));

        let ended2 = ended.clone();
        req.on_end(move || ended2.set(ended2.get() + 1));
        assert_eq!(ended.get(), 0);

        let body2 = body.clone();
        req.on_data(move |chunk| body2.borrow_mut().extend_from_slice(&chunk));

        assert_eq!(body.borrow().as_slice(), b"abcdef");
        assert_eq!(ended.get(), 1);

        req.handle_data_end();
        req.invalidate();
        assert_eq!(ended.get(), 1);
    }

    #[test]
    fn late_on_end_fires_immediately() {
        let req = request("/", &[]);
        let ended = Rc::new(Cell::new(false));

        let ended2 = ended.clone();
        req.on_end(move || ended2.set(true));

        assert!(ended.get());
    }

    #[test]
    fn invalidated_request_ignores_setters() {
        let req = request("/", &[]);
        req.invalidate();
        req.set_data("k", "v");

        assert!(!req.is_alive());
        assert_eq!(req.data("k"), None);
    }
}
