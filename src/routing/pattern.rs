use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Regex a `:name` segment matches when no custom one is given.
const SEGMENT: &str = "[^/]+?";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("route `{pattern}` does not compile: {error}")]
    Regex {
        pattern: String,
        #[source]
        error: regex::Error,
    },
    #[error("route `{0}` has a parameter without a name")]
    UnnamedParam(String),
    #[error("route `{0}` has an unbalanced custom parameter regex")]
    UnbalancedGroup(String),
}

/// Result of matching a path against a [`PathPattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub params: HashMap<String, String>,
    /// The part of the path the pattern consumed.
    pub base: String,
    /// For partial patterns, everything after `base`.
    pub rest: Option<String>,
}

/// A compiled route path.
///
/// Exact patterns match the whole path with one optional trailing slash.
/// Partial patterns match a leading part of the path ending on a segment
/// boundary and report the remainder, which is what mounted routers see.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    params: Vec<String>,
    partial: bool,
    regex: Regex,
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.partial == other.partial
    }
}

impl PathPattern {
    /// Compiles a pattern from a regex source whose capture groups
    /// correspond, in order, to `params`.
    pub fn new(source: &str, params: Vec<String>, partial: bool) -> Result<Self, PatternError> {
        let full = if !partial {
            format!("^({})(?:/?)$", source)
        } else if source.ends_with('/') {
            format!("^({})((?:[^/?#]*/?)*)$", source)
        } else {
            format!("^({})((?:/[^/?#]*)*)$", source)
        };

        let regex = RegexBuilder::new(&full)
            .case_insensitive(true)
            .build()
            .map_err(|error| PatternError::Regex {
                pattern: source.to_string(),
                error,
            })?;

        Ok(Self {
            source: source.to_string(),
            params,
            partial,
            regex,
        })
    }

    /// Compiles an Express-style path such as `/users/:id(\d+)/files/*`.
    ///
    /// Supported syntax: literal text, `:name` segments, `:name(regex)`
    /// segments with a custom regex, `:name?` optional segments (the
    /// leading slash becomes optional too) and `*` wildcards, which are
    /// named `"0"`, `"1"` and so on. A trailing slash is ignored.
    pub fn parse(path: &str, partial: bool) -> Result<Self, PatternError> {
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        let chars: Vec<char> = trimmed.chars().collect();

        let mut source = String::new();
        let mut params = Vec::new();
        let mut wildcards = 0;
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                ':' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    if start == i {
                        return Err(PatternError::UnnamedParam(path.to_string()));
                    }
                    let name: String = chars[start..i].iter().collect();

                    let mut segment = SEGMENT.to_string();
                    if i < chars.len() && chars[i] == '(' {
                        let (custom, end) = read_group(&chars, i)
                            .ok_or_else(|| PatternError::UnbalancedGroup(path.to_string()))?;
                        segment = non_capturing(&custom);
                        i = end;
                    }

                    let optional = i < chars.len() && chars[i] == '?';
                    if optional {
                        i += 1;
                        if source.ends_with('/') {
                            source.pop();
                            source.push_str(&format!("(?:/({}))?", segment));
                        } else {
                            source.push_str(&format!("({})?", segment));
                        }
                    } else {
                        source.push_str(&format!("({})", segment));
                    }
                    params.push(name);
                }
                '*' => {
                    i += 1;
                    source.push_str("(.*)");
                    params.push(wildcards.to_string());
                    wildcards += 1;
                }
                c => {
                    i += 1;
                    source.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
                }
            }
        }

        Self::new(&source, params, partial)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let caps = self.regex.captures(path)?;

        let base = caps.get(1).map_or("", |m| m.as_str()).to_string();

        let mut params = HashMap::new();
        for (idx, name) in self.params.iter().enumerate() {
            if let Some(m) = caps.get(idx + 2) {
                params.insert(name.clone(), m.as_str().to_string());
            }
        }

        let rest = if self.partial {
            caps.get(caps.len() - 1).map(|m| m.as_str().to_string())
        } else {
            None
        };

        Some(PathMatch { params, base, rest })
    }
}

/// Reads a parenthesised group starting at `open`. Returns the inner text
/// and the index just past the closing parenthesis.
fn read_group(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut depth = 0;
    let mut i = open;

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((chars[open + 1..i].iter().collect(), i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Turns every capturing group in `re` into a non-capturing one, so the
/// pattern's own groups stay aligned with its parameter names.
fn non_capturing(re: &str) -> String {
    let chars: Vec<char> = re.chars().collect();
    let mut out = String::with_capacity(re.len());
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                }
                i += 2;
                continue;
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => {
                let rest: String = chars[i + 1..].iter().collect();
                let named = ["?P<", "?<"]
                    .iter()
                    .find(|p| rest.starts_with(*p))
                    .and_then(|p| rest[p.len()..].find('>').map(|end| p.len() + end + 1));

                if let Some(skip) = named {
                    out.push_str("(?:");
                    i += 1 + rest[..skip].chars().count();
                    continue;
                }
                if !rest.starts_with('?') {
                    out.push_str("(?:");
                    i += 1;
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }

    out
}
