use std::fmt;

/// HTTP request methods understood by the server.
///
/// Any other token on the request line is rejected with
/// `405 Method Not Allowed` before it reaches the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    ACL,
    BIND,
    CHECKOUT,
    CONNECT,
    COPY,
    DELETE,
    GET,
    HEAD,
    LINK,
    LOCK,
    MSEARCH,
    MERGE,
    MKACTIVITY,
    MKCALENDAR,
    MKCOL,
    MOVE,
    NOTIFY,
    OPTIONS,
    PATCH,
    POST,
    PROPFIND,
    PROPPATCH,
    PURGE,
    PUT,
    REBIND,
    REPORT,
    SEARCH,
    SOURCE,
    SUBSCRIBE,
    TRACE,
    UNBIND,
    UNLINK,
    UNLOCK,
    UNSUBSCRIBE,
}

impl Method {
    /// Every method, in the order registrations for "all methods" expand to.
    pub const ALL: [Method; 34] = [
        Method::ACL,
        Method::BIND,
        Method::CHECKOUT,
        Method::CONNECT,
        Method::COPY,
        Method::DELETE,
        Method::GET,
        Method::HEAD,
        Method::LINK,
        Method::LOCK,
        Method::MSEARCH,
        Method::MERGE,
        Method::MKACTIVITY,
        Method::MKCALENDAR,
        Method::MKCOL,
        Method::MOVE,
        Method::NOTIFY,
        Method::OPTIONS,
        Method::PATCH,
        Method::POST,
        Method::PROPFIND,
        Method::PROPPATCH,
        Method::PURGE,
        Method::PUT,
        Method::REBIND,
        Method::REPORT,
        Method::SEARCH,
        Method::SOURCE,
        Method::SUBSCRIBE,
        Method::TRACE,
        Method::UNBIND,
        Method::UNLINK,
        Method::UNLOCK,
        Method::UNSUBSCRIBE,
    ];

    /// Parses a method token from the request line.
    ///
    /// Matching is case-sensitive, so `get` is not a method.
    ///
    /// # Example
    ///
    /// ```
    /// # use expressway::http::method::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("M-SEARCH"), Some(Method::MSEARCH));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    /// Returns the wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Method::ACL => "ACL",
            Method::BIND => "BIND",
            Method::CHECKOUT => "CHECKOUT",
            Method::CONNECT => "CONNECT",
            Method::COPY => "COPY",
            Method::DELETE => "DELETE",
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::LINK => "LINK",
            Method::LOCK => "LOCK",
            Method::MSEARCH => "M-SEARCH",
            Method::MERGE => "MERGE",
            Method::MKACTIVITY => "MKACTIVITY",
            Method::MKCALENDAR => "MKCALENDAR",
            Method::MKCOL => "MKCOL",
            Method::MOVE => "MOVE",
            Method::NOTIFY => "NOTIFY",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::POST => "POST",
            Method::PROPFIND => "PROPFIND",
            Method::PROPPATCH => "PROPPATCH",
            Method::PURGE => "PURGE",
            Method::PUT => "PUT",
            Method::REBIND => "REBIND",
            Method::REPORT => "REPORT",
            Method::SEARCH => "SEARCH",
            Method::SOURCE => "SOURCE",
            Method::SUBSCRIBE => "SUBSCRIBE",
            Method::TRACE => "TRACE",
            Method::UNBIND => "UNBIND",
            Method::UNLINK => "UNLINK",
            Method::UNLOCK => "UNLOCK",
            Method::UNSUBSCRIBE => "UNSUBSCRIBE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
