//! Dynamic route compilation.
//!
//! # Responsibilities
//! - Recognize dynamic route definitions (`/blog/[slug]`)
//! - Compile definitions into anchored regexes with named groups
//! - Extract percent-decoded parameter values from concrete pathnames
//!
//! # Design Decisions
//! - `[name]` matches one segment, `[...name]` one or more segments,
//!   `[[...name]]` zero or more segments
//! - Catch-all values are returned as arrays, single values as strings
//! - Group order follows segment order; `pos` is 1-based like capture indices

use regex::Regex;

use crate::adapter::envelope::{Params, QueryValue};
use crate::adapter::error::{AdapterError, AdapterResult};

/// Prefix applied to route keys in proxy-supplied route matches.
pub const NEXT_QUERY_PARAM_PREFIX: &str = "nxtP";

/// Prefix applied to interception route keys.
pub const NEXT_INTERCEPTION_MARKER_PREFIX: &str = "nxtI";

/// A named parameter segment of a route definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGroup {
    pub name: String,
    pub pos: usize,
    pub repeat: bool,
    pub optional: bool,
}

impl RouteGroup {
    /// The literal segment as written in the definition, e.g. `[...slug]`.
    pub fn template(&self) -> String {
        let inner = if self.repeat {
            format!("[...{}]", self.name)
        } else {
            format!("[{}]", self.name)
        };
        if self.optional {
            format!("[{inner}]")
        } else {
            inner
        }
    }

    /// Route key used by the proxy for this group.
    pub fn route_key(&self) -> String {
        format!("{}{}", NEXT_QUERY_PARAM_PREFIX, self.name)
    }
}

/// Compiled route definition.
#[derive(Debug, Clone)]
pub struct RouteRegex {
    page: String,
    re: Regex,
    groups: Vec<RouteGroup>,
}

impl RouteRegex {
    /// Compile a route definition such as `/shop/[category]/[[...rest]]`.
    pub fn new(page: &str) -> Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        let mut groups = Vec::new();

        for segment in page.split('/').filter(|s| !s.is_empty()) {
            match parse_param_segment(segment) {
                Some((name, repeat, optional)) => {
                    groups.push(RouteGroup {
                        name: name.to_string(),
                        pos: groups.len() + 1,
                        repeat,
                        optional,
                    });
                    pattern.push_str(match (repeat, optional) {
                        (true, true) => "(?:/(.+?))?",
                        (true, false) => "/(.+?)",
                        _ => "/([^/]+?)",
                    });
                }
                None => {
                    pattern.push('/');
                    pattern.push_str(&regex::escape(segment));
                }
            }
        }
        pattern.push_str("(?:/)?$");

        Ok(Self {
            page: page.to_string(),
            re: Regex::new(&pattern)?,
            groups,
        })
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn groups(&self) -> &[RouteGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&RouteGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn is_match(&self, pathname: &str) -> bool {
        self.re.is_match(pathname)
    }

    /// Match `pathname` and extract decoded parameter values.
    pub fn match_params(&self, pathname: &str) -> AdapterResult<Option<Params>> {
        let Some(captures) = self.re.captures(pathname) else {
            return Ok(None);
        };

        let mut params = Params::new();
        for group in &self.groups {
            let Some(raw) = captures.get(group.pos) else {
                continue;
            };
            let value = if group.repeat {
                QueryValue::Many(
                    raw.as_str()
                        .split('/')
                        .map(decode_param)
                        .collect::<AdapterResult<Vec<_>>>()?,
                )
            } else {
                QueryValue::One(decode_param(raw.as_str())?)
            };
            params.insert(group.name.clone(), value);
        }
        Ok(Some(params))
    }
}

fn decode_param(raw: &str) -> AdapterResult<String> {
    urlencoding::decode(raw)
        .map(|v| v.into_owned())
        .map_err(|_| AdapterError::Decode(format!("route parameter {raw:?}")))
}

/// Split `[name]`, `[...name]` or `[[...name]]` into (name, repeat, optional).
fn parse_param_segment(segment: &str) -> Option<(&str, bool, bool)> {
    let (inner, optional) = match segment
        .strip_prefix("[[")
        .and_then(|s| s.strip_suffix("]]"))
    {
        Some(inner) => (inner, true),
        None => (segment.strip_prefix('[')?.strip_suffix(']')?, false),
    };
    let (name, repeat) = match inner.strip_prefix("...") {
        Some(name) => (name, true),
        None => (inner, false),
    };
    if name.is_empty() {
        return None;
    }
    Some((name, repeat, optional && repeat))
}

/// True when any segment of `pathname` is a bracketed parameter.
pub fn is_dynamic_route(pathname: &str) -> bool {
    pathname
        .split('/')
        .any(|segment| segment.len() > 2 && segment.starts_with('[') && segment.ends_with(']'))
}

/// Reverse the build-time page path encoding (`/index` → `/`).
pub fn denormalize_page_path(page: &str) -> String {
    let page = page.replace('\\', "/");
    if page.starts_with("/index/") && !is_dynamic_route(&page) {
        return page["/index".len()..].to_string();
    }
    if page == "/index" {
        return "/".to_string();
    }
    page
}
