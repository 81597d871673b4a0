use std::collections::HashMap;
use std::time::SystemTime;

/// `SameSite` attribute of a response cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    None,
    Lax,
    Strict,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::None => "None",
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
        }
    }
}

/// A cookie to be sent with a response, built in a fluent style.
///
/// # Example
///
/// ```
/// # use expressway::http::cookie::{Cookie, SameSite};
/// let cookie = Cookie::new("abc")
///     .path("/")
///     .same_site(SameSite::Lax)
///     .http_only(true);
///
/// assert_eq!(
///     cookie.serialize("sid"),
///     "sid=abc; Path=/; SameSite=Lax; HttpOnly"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    value: String,
    expires: Option<SystemTime>,
    max_age: Option<u64>,
    domain: Option<String>,
    path: Option<String>,
    same_site: Option<SameSite>,
    secure: bool,
    http_only: bool,
}

impl Cookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn expires(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    /// Lifetime in seconds.
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Turns this cookie into one that tells the client to drop it.
    pub(crate) fn cleared(mut self) -> Self {
        self.value.clear();
        self.max_age = Some(0);
        self.expires = Some(SystemTime::UNIX_EPOCH);
        self
    }

    /// Renders the `Set-Cookie` header value for `name`.
    pub fn serialize(&self, name: &str) -> String {
        let mut out = format!("{}={}", name, self.value);

        if let Some(at) = self.expires {
            out.push_str("; Expires=");
            out.push_str(&httpdate::fmt_http_date(at));
        }
        if let Some(age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", age));
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(same_site) = self.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site.as_str());
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }

        out
    }
}

/// Parses a request `Cookie` header into name/value pairs.
///
/// The first occurrence of a name wins; quoted values are unquoted.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        cookies
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    cookies
}
