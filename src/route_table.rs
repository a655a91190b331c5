//! The Route Table (C5, §4.5): a compiled, ordered representation of the mounts in
//! [`RouteConfig`](crate::config::RouteConfig), ready for the resolver to walk on every
//! request without re-parsing configuration each time.
//!
//! Grounded on the teacher's `api/api.rs`, which kept its own `HashMap<(Method, String), _>`
//! of registered routes and did a first-match walk over them; the gateway's mounts are looked
//! up the same way, but action resolution additionally needs an *ordered* alias list (for
//! first-match-wins) rather than a hash map, since JSON object key order is semantically
//! significant here.

use crate::config::{BodyParsersConfig, RouteConfig};
use http::Method;

/// A single compiled alias: either method-qualified (`"GET hello"`) or any-method (`"add"`).
#[derive(Debug, Clone, PartialEq)]
pub enum AliasKey {
    Any(String),
    Method(Method, String),
}

impl AliasKey {
    /// Parses an alias declaration key of the form `"<METHOD> <path>"` or a bare `"<path>"`.
    /// The path half is stored in the same normalized (no leading/trailing slash) form as
    /// mount paths (§2.2), so `"GET /hello"`, `"GET hello"` and `"GET hello/"` all compile to
    /// the same alias.
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some((method, path)) = raw.split_once(char::is_whitespace) {
            if let Ok(method) = Method::from_bytes(method.as_bytes()) {
                return AliasKey::Method(method, normalize_mount_path(path.trim()));
            }
        }
        AliasKey::Any(normalize_mount_path(raw))
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        match self {
            AliasKey::Any(alias_path) => alias_path == path,
            AliasKey::Method(alias_method, alias_path) => {
                alias_method == method && alias_path == path
            }
        }
    }
}

/// A single segment of a compiled whitelist pattern: either a literal action-name segment
/// or a `*` glob that matches any single segment (§4.5's "single-segment glob" rule — no
/// cross-segment or regex matching is implemented).
#[derive(Debug, Clone, PartialEq)]
enum WhitelistPattern {
    Exact(String),
    Glob(Vec<GlobSegment>),
}

#[derive(Debug, Clone, PartialEq)]
enum GlobSegment {
    Literal(String),
    Wildcard,
}

impl WhitelistPattern {
    fn compile(raw: &str) -> Self {
        if !raw.contains('*') {
            return WhitelistPattern::Exact(raw.to_owned());
        }
        let segments = raw
            .split('.')
            .map(|segment| {
                if segment == "*" {
                    GlobSegment::Wildcard
                } else {
                    GlobSegment::Literal(segment.to_owned())
                }
            })
            .collect();
        WhitelistPattern::Glob(segments)
    }

    fn matches(&self, action: &str) -> bool {
        match self {
            WhitelistPattern::Exact(pattern) => pattern == action,
            WhitelistPattern::Glob(pattern_segments) => {
                let action_segments: Vec<&str> = action.split('.').collect();
                if pattern_segments.len() != action_segments.len() {
                    return false;
                }
                pattern_segments
                    .iter()
                    .zip(action_segments.iter())
                    .all(|(pattern, actual)| match pattern {
                        GlobSegment::Wildcard => true,
                        GlobSegment::Literal(literal) => literal == actual,
                    })
            }
        }
    }
}

/// A mount, compiled from a [`RouteConfig`] into the shapes the resolver needs at request
/// time: a normalized mount path, an ordered alias list, a compiled whitelist (if any), and
/// this mount's own body-parser switches.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub path: String,
    aliases: Vec<(AliasKey, String)>,
    whitelist: Option<Vec<WhitelistPattern>>,
    pub body_parsers: BodyParsersConfig,
}

impl CompiledRoute {
    pub fn compile(config: RouteConfig) -> Self {
        let aliases = config
            .aliases
            .into_iter()
            .map(|(key, target)| {
                let target = target.as_str().unwrap_or_default().to_owned();
                (AliasKey::parse(&key), target)
            })
            .collect();
        let whitelist = config
            .whitelist
            .map(|patterns| patterns.iter().map(|p| WhitelistPattern::compile(p)).collect());
        CompiledRoute {
            path: normalize_mount_path(&config.path),
            aliases,
            whitelist,
            body_parsers: config.body_parsers,
        }
    }

    /// Looks up an alias for `path` under `method`, preferring a method-qualified match over
    /// an any-method one, both walked in declaration order (§4.5's alias resolution rule).
    /// `path` is normalized the same way alias declarations are before comparing, so a
    /// request path with a leading or trailing slash still matches (§2.2).
    pub fn resolve_alias(&self, method: &Method, path: &str) -> Option<&str> {
        let path = normalize_mount_path(path);
        let path = path.as_str();
        self.aliases
            .iter()
            .find(|(key, _)| matches!(key, AliasKey::Method(m, _) if m == method) && key.matches(method, path))
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|(key, _)| matches!(key, AliasKey::Any(_)) && key.matches(method, path))
            })
            .map(|(_, target)| target.as_str())
    }

    /// Whether `action` is allowed through this mount's whitelist. No whitelist means
    /// everything is allowed.
    pub fn allows(&self, action: &str) -> bool {
        match &self.whitelist {
            None => true,
            Some(patterns) => patterns.iter().any(|p| p.matches(action)),
        }
    }
}

/// Strips a leading slash so mount paths can be concatenated with a single separator, and
/// strips a trailing slash so `"/api/"` and `"/api"` mount identically (§2.2's trailing-slash
/// normalization).
fn normalize_mount_path(raw: &str) -> String {
    raw.trim_matches('/').to_owned()
}

/// The gateway's full, ordered set of compiled mounts (§4.5). Mounts are tried in
/// declaration order; the first whose path is a prefix of the request path wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    global_prefix: String,
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(global_prefix: &str, configs: Vec<RouteConfig>) -> Self {
        RouteTable {
            global_prefix: normalize_mount_path(global_prefix),
            routes: configs.into_iter().map(CompiledRoute::compile).collect(),
        }
    }

    /// Strips the global prefix from `path`, returning `None` if `path` doesn't start with
    /// it (a request outside the gateway's configured mount point entirely). The match is
    /// segment-aware, like [`find_mount`](Self::find_mount): `path` must either equal the
    /// prefix exactly or continue with a `/`, so prefix `"api"` does not swallow `/apiextra`.
    pub fn strip_global_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let trimmed = path.trim_start_matches('/');
        if self.global_prefix.is_empty() {
            return Some(trimmed);
        }
        trimmed
            .strip_prefix(self.global_prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .map(|rest| rest.trim_start_matches('/'))
    }

    /// Finds the first mount (in declaration order) whose path prefixes `path`, returning the
    /// mount and the remaining path beneath it.
    pub fn find_mount<'a>(&self, path: &'a str) -> Option<(&CompiledRoute, &'a str)> {
        self.routes.iter().find_map(|route| {
            if route.path.is_empty() {
                return Some((route, path));
            }
            path.strip_prefix(route.path.as_str())
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
                .map(|rest| (route, rest.trim_start_matches('/')))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn route(json: serde_json::Value) -> RouteConfig {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn exact_whitelist_allows_only_the_named_action() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({
            "whitelist": ["test.hello"]
        })));
        assert!(compiled.allows("test.hello"));
        assert!(!compiled.allows("test.other"));
    }

    #[test]
    fn glob_whitelist_matches_a_single_wildcard_segment() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({
            "whitelist": ["math.*"]
        })));
        assert!(compiled.allows("math.add"));
        assert!(compiled.allows("math.sub"));
        assert!(!compiled.allows("math.add.extra"));
        assert!(!compiled.allows("other.add"));
    }

    #[test]
    fn no_whitelist_allows_everything() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({})));
        assert!(compiled.allows("anything.goes"));
    }

    #[test]
    fn method_qualified_alias_wins_over_any_method_alias() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({
            "aliases": {
                "hello": "any.hello",
                "GET hello": "get.hello"
            }
        })));
        assert_eq!(
            compiled.resolve_alias(&Method::GET, "hello"),
            Some("get.hello")
        );
        assert_eq!(
            compiled.resolve_alias(&Method::POST, "hello"),
            Some("any.hello")
        );
    }

    #[test]
    fn first_declared_any_method_alias_wins_on_duplicate_paths() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({
            "aliases": {
                "dup": "first.target",
                "dup ": "second.target"
            }
        })));
        // Both keys trim to the same alias path; declaration order picks the first.
        assert_eq!(
            compiled.resolve_alias(&Method::GET, "dup"),
            Some("first.target")
        );
    }

    #[test]
    fn mount_paths_strip_leading_and_trailing_slashes() {
        let table = RouteTable::new(
            "/api/",
            vec![route(serde_json::json!({ "path": "/v1/" }))],
        );
        let rest = table.strip_global_prefix("/api/v1/users").unwrap();
        let (mount, remainder) = table.find_mount(rest).unwrap();
        assert_eq!(mount.path, "v1");
        assert_eq!(remainder, "users");
    }

    #[test]
    fn paths_outside_the_global_prefix_do_not_strip() {
        let table = RouteTable::new("/api", vec![]);
        assert_eq!(table.strip_global_prefix("/other/path"), None);
    }

    #[test]
    fn global_prefix_does_not_swallow_a_partial_segment_match() {
        let table = RouteTable::new("api", vec![]);
        assert_eq!(table.strip_global_prefix("/apiextra/x"), None);
        assert_eq!(table.strip_global_prefix("/api/x"), Some("x"));
        assert_eq!(table.strip_global_prefix("/api"), Some(""));
    }

    #[test]
    fn alias_declared_with_surrounding_slashes_still_matches_a_bare_path() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({
            "aliases": {
                "GET /hello/": "test.hello",
                "/add/": "math.add"
            }
        })));
        assert_eq!(
            compiled.resolve_alias(&Method::GET, "hello"),
            Some("test.hello")
        );
        assert_eq!(
            compiled.resolve_alias(&Method::POST, "add"),
            Some("math.add")
        );
    }

    #[test]
    fn alias_lookup_normalizes_a_request_path_with_surrounding_slashes() {
        let compiled = CompiledRoute::compile(route(serde_json::json!({
            "aliases": {
                "hello": "test.hello"
            }
        })));
        assert_eq!(
            compiled.resolve_alias(&Method::GET, "/hello/"),
            Some("test.hello")
        );
    }
}
