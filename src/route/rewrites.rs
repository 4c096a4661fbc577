//! Rewrite rule evaluation and manifest access.
//!
//! # Responsibilities
//! - Compile rewrite sources (`/docs/:path*`) into matchers
//! - Check `has` / `missing` request conditions
//! - Build the rewritten pathname and query from a destination
//! - Provide the routes manifest (static config or manifest file)
//!
//! # Design Decisions
//! - Source patterns support `:name`, `:name?`, `:name*` and `:name+`
//! - Destinations with a scheme are external; they end evaluation untouched
//! - Params not referenced by the destination path are appended to the query

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::adapter::envelope::{parse_query, Params, Query, QueryValue, RequestEnvelope};
use crate::config::schema::{RewriteRule, RewritesConfig, RouteCondition};

/// Routes manifest contents the pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct RoutesManifest {
    pub rewrites: RewritesConfig,
    /// `rewrites` with every source compiled.
    pub compiled: CompiledRewrites,
}

impl RoutesManifest {
    pub fn new(rewrites: RewritesConfig, case_sensitive: bool) -> Self {
        let compiled = CompiledRewrites::compile(&rewrites, case_sensitive);
        Self { rewrites, compiled }
    }
}

/// A rewrite rule with its source pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRewrite {
    pub rule: RewriteRule,
    pub source: SourcePattern,
}

/// Rewrite lists compiled once per manifest.
#[derive(Debug, Clone, Default)]
pub struct CompiledRewrites {
    pub before_files: Vec<CompiledRewrite>,
    pub after_files: Vec<CompiledRewrite>,
    pub fallback: Vec<CompiledRewrite>,
}

impl CompiledRewrites {
    /// Rules whose source does not compile are logged and skipped.
    pub fn compile(rewrites: &RewritesConfig, case_sensitive: bool) -> Self {
        let compile_list = |rules: &[RewriteRule]| {
            rules
                .iter()
                .filter_map(|rule| match SourcePattern::compile(&rule.source, case_sensitive) {
                    Ok(source) => Some(CompiledRewrite {
                        rule: rule.clone(),
                        source,
                    }),
                    Err(e) => {
                        tracing::warn!(
                            source = %rule.source,
                            error = %e,
                            "Skipping invalid rewrite source"
                        );
                        None
                    }
                })
                .collect::<Vec<_>>()
        };
        Self {
            before_files: compile_list(&rewrites.before_files),
            after_files: compile_list(&rewrites.after_files),
            fallback: compile_list(&rewrites.fallback),
        }
    }

    pub fn len(&self) -> usize {
        self.before_files.len() + self.after_files.len() + self.fallback.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes manifest accessor.
pub trait ManifestSource: Send + Sync + std::fmt::Debug {
    fn routes_manifest(&self) -> Option<Arc<RoutesManifest>>;
}

/// Manifest built from in-memory configuration.
#[derive(Debug, Clone)]
pub struct StaticManifest(Option<Arc<RoutesManifest>>);

impl StaticManifest {
    pub fn new(rewrites: RewritesConfig, case_sensitive: bool) -> Self {
        Self(Some(Arc::new(RoutesManifest::new(rewrites, case_sensitive))))
    }

    pub fn empty() -> Self {
        Self(None)
    }
}

impl ManifestSource for StaticManifest {
    fn routes_manifest(&self) -> Option<Arc<RoutesManifest>> {
        self.0.clone()
    }
}

/// On-disk `routes-manifest.json` layout.
#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    rewrites: ManifestRewrites,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestRewrites {
    Grouped(RewritesConfig),
    Legacy(Vec<RewriteRule>),
}

impl Default for ManifestRewrites {
    fn default() -> Self {
        ManifestRewrites::Grouped(RewritesConfig::default())
    }
}

/// Manifest read once from a `routes-manifest.json` file.
#[derive(Debug, Clone)]
pub struct FileManifest {
    path: PathBuf,
    manifest: Arc<RoutesManifest>,
}

impl FileManifest {
    pub fn load(path: &Path, case_sensitive: bool) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ManifestFile = serde_json::from_str(&content)?;
        let rewrites = match file.rewrites {
            ManifestRewrites::Grouped(grouped) => grouped,
            ManifestRewrites::Legacy(rules) => RewritesConfig {
                after_files: rules,
                ..Default::default()
            },
        };
        tracing::info!(
            path = ?path,
            before_files = rewrites.before_files.len(),
            after_files = rewrites.after_files.len(),
            fallback = rewrites.fallback.len(),
            "Loaded routes manifest"
        );
        Ok(Self {
            path: path.to_path_buf(),
            manifest: Arc::new(RoutesManifest::new(rewrites, case_sensitive)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestSource for FileManifest {
    fn routes_manifest(&self) -> Option<Arc<RoutesManifest>> {
        Some(self.manifest.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone)]
struct SourceKey {
    name: String,
    modifier: Modifier,
}

/// Compiled rewrite source pattern.
#[derive(Debug, Clone)]
pub struct SourcePattern {
    re: Regex,
    keys: Vec<SourceKey>,
}

impl SourcePattern {
    pub fn compile(source: &str, case_sensitive: bool) -> Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        let mut keys = Vec::new();

        for segment in source.split('/').filter(|s| !s.is_empty()) {
            let Some(param) = segment.strip_prefix(':') else {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
                continue;
            };
            let (name, modifier) = match param.chars().last() {
                Some('?') => (&param[..param.len() - 1], Modifier::Optional),
                Some('*') => (&param[..param.len() - 1], Modifier::ZeroOrMore),
                Some('+') => (&param[..param.len() - 1], Modifier::OneOrMore),
                _ => (param, Modifier::None),
            };
            pattern.push_str(match modifier {
                Modifier::None => "/([^/]+?)",
                Modifier::Optional => "(?:/([^/]+?))?",
                Modifier::ZeroOrMore => "(?:/((?:[^/]+?)(?:/[^/]+?)*))?",
                Modifier::OneOrMore => "/((?:[^/]+?)(?:/[^/]+?)*)",
            });
            keys.push(SourceKey {
                name: name.to_string(),
                modifier,
            });
        }
        if pattern == "^" {
            pattern.push('/');
        }
        pattern.push_str("/?$");

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self { re, keys })
    }

    /// Match a pathname, returning the named values.
    pub fn match_path(&self, pathname: &str) -> Option<Params> {
        let captures = self.re.captures(pathname)?;
        let mut params = Params::new();
        for (i, key) in self.keys.iter().enumerate() {
            let Some(raw) = captures.get(i + 1) else {
                continue;
            };
            let value = match key.modifier {
                Modifier::ZeroOrMore | Modifier::OneOrMore => QueryValue::Many(
                    raw.as_str().split('/').map(str::to_string).collect(),
                ),
                _ => QueryValue::One(raw.as_str().to_string()),
            };
            params.insert(key.name.clone(), value);
        }
        Some(params)
    }
}

/// Evaluate `has` / `missing` conditions; captured values are added to params.
pub fn check_conditions(rule: &RewriteRule, env: &RequestEnvelope, params: &mut Params) -> bool {
    let cookies = env.header("cookie").map(parse_cookies).unwrap_or_default();
    let host = env
        .header("host")
        .map(|h| h.split(':').next().unwrap_or_default().to_lowercase());

    // Some(Some(..)) holds and captured a value, Some(None) holds, None fails.
    let holds = |condition: &RouteCondition| -> Option<Option<(String, String)>> {
        let (key, actual, expected) = match condition {
            RouteCondition::Header { key, value } => {
                (key, env.header(key).map(str::to_string), value)
            }
            RouteCondition::Query { key, value } => (
                key,
                env.query().get(key).and_then(|v| v.first()).map(str::to_string),
                value,
            ),
            RouteCondition::Cookie { key, value } => (key, cookies.get(key).cloned(), value),
            RouteCondition::Host { value } => {
                return (host.as_deref() == Some(value.to_lowercase().as_str())).then_some(None);
            }
        };
        let actual = actual?;
        match expected {
            Some(expected) if *expected != actual => None,
            _ => Some(Some((key.clone(), actual))),
        }
    };

    let mut captured = Vec::new();
    for condition in &rule.has {
        match holds(condition) {
            Some(pair) => captured.extend(pair),
            None => return false,
        }
    }
    if rule.missing.iter().any(|c| holds(c).is_some()) {
        return false;
    }
    for (key, value) in captured {
        params.entry(key).or_insert(QueryValue::One(value));
    }
    true
}

fn parse_cookies(header: &str) -> std::collections::HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// A rewrite destination resolved against matched params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Points at another origin; the pipeline leaves the request alone.
    External(String),
    Internal { pathname: String, query: Query },
}

/// Interpolate `:name` tokens in `destination` and append unused params.
pub fn prepare_destination(destination: &str, params: &Params) -> Destination {
    if destination.contains("://") {
        return Destination::External(interpolate_tokens(destination, params, &mut Vec::new()));
    }

    let (path, raw_query) = match destination.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (destination, None),
    };

    let mut used = Vec::new();
    let mut pathname = interpolate_tokens(path, params, &mut used);
    // empty optional segments leave `//` behind
    while pathname.contains("//") {
        pathname = pathname.replace("//", "/");
    }
    if pathname.len() > 1 && pathname.ends_with('/') {
        pathname.pop();
    }
    if pathname.is_empty() {
        pathname.push('/');
    }

    let mut query = raw_query
        .map(|q| parse_query(&interpolate_tokens(q, params, &mut Vec::new())))
        .unwrap_or_default();
    for (key, value) in params {
        if !used.contains(key) {
            query.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    Destination::Internal { pathname, query }
}

/// Replace `:name` tokens (with optional `*`, `+`, `?` modifier) by param
/// values. Missing params become empty; `:8080`-style ports are left alone.
fn interpolate_tokens(template: &str, params: &Params, used: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(idx) = rest.find(':') {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];
        if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            out.push(':');
            rest = after;
            continue;
        }
        if let Some(value) = params.get(name) {
            used.push(name.to_string());
            let encoded: Vec<String> = value
                .values()
                .iter()
                .map(|v| urlencoding::encode(v).into_owned())
                .collect();
            out.push_str(&encoded.join("/"));
        }
        let tail = &after[name_len..];
        rest = tail.strip_prefix(['*', '+', '?']).unwrap_or(tail);
    }
    out.push_str(rest);
    out
}
