//! Request interception: URL patterns, mock rules and the registry that
//! answers "should this request be served a canned response?".
//!
//! Rules are matched in registration order and the first match wins.
//! Re-registering the same `(pattern, method)` replaces the earlier rule in
//! place, so it keeps its priority.

use crate::result::{ProofError, ProofResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// =============================================================================
// HTTP METHOD
// =============================================================================

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    #[default]
    Any,
    /// A request method outside this list (TRACE, CONNECT, WebDAV verbs).
    /// Only `Any` rules match it.
    Other,
}

impl HttpMethod {
    /// Parse a wire method name; unknown methods map to `Other`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }

    /// Wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
            Self::Other => "OTHER",
        }
    }

    /// Check if this method, used as a rule filter, accepts `request`.
    ///
    /// `Any` on either side matches, except that an `Other` request is
    /// only accepted by an `Any` filter.
    #[must_use]
    pub fn matches(&self, request: &Self) -> bool {
        match (self, request) {
            (Self::Any, _) => true,
            (_, Self::Other) | (Self::Other, _) => false,
            (_, Self::Any) => true,
            (filter, request) => filter == request,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// URL PATTERN
// =============================================================================

/// A compiled URL pattern.
///
/// Globs: `**` matches anything, `*` anything except `/`, `?` one character,
/// `{a,b}` either alternative. A leading `/` matches against the URL path
/// only (query and fragment ignored), anything else against the whole URL.
/// A `re:` prefix takes a regular expression searched anywhere in the URL.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
    path_only: bool,
}

impl UrlPattern {
    /// Compile a pattern
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty patterns, unbalanced braces
    /// or invalid regular expressions.
    pub fn parse(source: &str) -> ProofResult<Self> {
        if source.trim().is_empty() {
            return Err(ProofError::configuration("URL pattern must not be empty"));
        }

        if let Some(expr) = source.strip_prefix("re:") {
            if expr.is_empty() {
                return Err(ProofError::configuration("regex URL pattern 're:' is empty"));
            }
            let regex = Regex::new(expr).map_err(|e| {
                ProofError::configuration(format!("invalid URL regex '{expr}': {e}"))
            })?;
            return Ok(Self {
                source: source.to_string(),
                regex,
                path_only: false,
            });
        }

        let translated = glob_to_regex(source)?;
        let regex = Regex::new(&translated).map_err(|e| {
            ProofError::configuration(format!("invalid URL pattern '{source}': {e}"))
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
            path_only: source.starts_with('/'),
        })
    }

    /// Pattern as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether a URL matches
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        if self.path_only {
            self.regex.is_match(url_path(url))
        } else {
            self.regex.is_match(url)
        }
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for UrlPattern {}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn glob_to_regex(glob: &str) -> ProofResult<String> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');
    let mut in_group = false;
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push('.'),
            '{' if in_group => {
                return Err(ProofError::configuration(format!(
                    "nested '{{' in URL pattern '{glob}'"
                )));
            }
            '{' => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            '}' => {
                return Err(ProofError::configuration(format!(
                    "unbalanced '}}' in URL pattern '{glob}'"
                )));
            }
            ',' if in_group => out.push('|'),
            other => {
                let mut buf = [0_u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }

    if in_group {
        return Err(ProofError::configuration(format!(
            "unclosed '{{' in URL pattern '{glob}'"
        )));
    }
    out.push('$');
    Ok(out)
}

/// Path part of a URL, without scheme, host, query or fragment
pub(crate) fn url_path(url: &str) -> &str {
    let rest = match url.find("://") {
        Some(idx) => {
            let after = &url[idx + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "/",
            }
        }
        None => url,
    };
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

// =============================================================================
// MOCK RULE
// =============================================================================

fn default_status() -> u16 {
    200
}

fn default_content_type() -> String {
    "application/json".to_string()
}

/// A canned response for requests matching `url_pattern`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMockRule")]
pub struct MockRule {
    /// Glob or `re:` pattern, compiled at registration
    pub url_pattern: String,
    /// Method filter
    pub method: HttpMethod,
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header value
    pub content_type: String,
    /// Response body, served verbatim
    pub body: String,
    /// Extra response headers
    pub headers: BTreeMap<String, String>,
}

/// On-disk form: the body may be a string or inline JSON.
#[derive(Deserialize)]
struct RawMockRule {
    #[serde(alias = "url")]
    url_pattern: String,
    #[serde(default)]
    method: HttpMethod,
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    json: Option<serde_json::Value>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl TryFrom<RawMockRule> for MockRule {
    type Error = String;

    fn try_from(raw: RawMockRule) -> Result<Self, Self::Error> {
        let body = match (raw.body, raw.json) {
            (Some(_), Some(_)) => {
                return Err(format!(
                    "mock '{}' sets both 'body' and 'json'",
                    raw.url_pattern
                ))
            }
            (Some(body), None) => body,
            (None, Some(json)) => json.to_string(),
            (None, None) => String::new(),
        };
        Ok(Self {
            url_pattern: raw.url_pattern,
            method: raw.method,
            status: raw.status,
            content_type: raw.content_type,
            body,
            headers: raw.headers,
        })
    }
}

impl MockRule {
    /// Create a rule with an explicit body
    #[must_use]
    pub fn new(
        url_pattern: impl Into<String>,
        status: u16,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            method: HttpMethod::Any,
            status,
            content_type: content_type.into(),
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// 200 response with a JSON body
    #[must_use]
    pub fn json(url_pattern: impl Into<String>, body: &serde_json::Value) -> Self {
        Self::new(url_pattern, 200, "application/json", body.to_string())
    }

    /// Set the method filter
    #[must_use]
    pub const fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a response header
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.headers.insert(key.into(), value.into());
        self
    }

    /// All response headers, `Content-Type` first
    #[must_use]
    pub fn response_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), self.content_type.clone())];
        headers.extend(
            self.headers
                .iter()
                .filter(|(k, _)| !k.eq_ignore_ascii_case("content-type"))
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        headers
    }
}

// =============================================================================
// INTERCEPTION LOG
// =============================================================================

/// One request seen by the interception layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptedRequest {
    /// Request method
    pub method: HttpMethod,
    /// Full request URL
    pub url: String,
    /// Pattern of the rule that served it; `None` means passed through
    pub matched: Option<String>,
    /// Status served, if mocked
    pub status: Option<u16>,
}

impl InterceptedRequest {
    /// Whether a mock answered this request
    #[must_use]
    pub const fn was_mocked(&self) -> bool {
        self.matched.is_some()
    }
}

/// Shared, append-only record of intercepted requests.
///
/// Clones share the same storage so the browser-side handler and the
/// runner see the same entries.
#[derive(Debug, Clone, Default)]
pub struct InterceptionLog {
    entries: Arc<Mutex<Vec<InterceptedRequest>>>,
}

impl InterceptionLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, request: InterceptedRequest) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(request);
        }
    }

    /// Snapshot of all entries
    #[must_use]
    pub fn entries(&self) -> Vec<InterceptedRequest> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries answered by a mock
    #[must_use]
    pub fn mocked(&self) -> Vec<InterceptedRequest> {
        self.entries().into_iter().filter(InterceptedRequest::was_mocked).collect()
    }
}

// =============================================================================
// MOCK REGISTRY
// =============================================================================

#[derive(Debug, Clone)]
struct Entry {
    pattern: UrlPattern,
    rule: MockRule,
}

/// Ordered set of mock rules
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    entries: Vec<Entry>,
}

impl MockRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from rules, in order
    ///
    /// # Errors
    ///
    /// Fails on the first rule [`register`](Self::register) rejects.
    pub fn from_rules<I>(rules: I) -> ProofResult<Self>
    where
        I: IntoIterator<Item = MockRule>,
    {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    /// Add a rule, replacing any rule with the same pattern and method
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern does not compile or
    /// the status is not a valid HTTP status code.
    pub fn register(&mut self, rule: MockRule) -> ProofResult<()> {
        let pattern = UrlPattern::parse(&rule.url_pattern)?;
        if rule.method == HttpMethod::Other {
            return Err(ProofError::configuration(format!(
                "mock '{}' must name a concrete method or omit it",
                rule.url_pattern
            )));
        }
        if !(100..=599).contains(&rule.status) {
            return Err(ProofError::configuration(format!(
                "mock '{}' has invalid status {}",
                rule.url_pattern, rule.status
            )));
        }

        let existing = self
            .entries
            .iter_mut()
            .find(|e| e.pattern == pattern && e.rule.method == rule.method);
        match existing {
            Some(entry) => {
                tracing::debug!(pattern = %pattern, method = %rule.method, "replacing mock rule");
                entry.rule = rule;
            }
            None => {
                tracing::debug!(pattern = %pattern, method = %rule.method, "registering mock rule");
                self.entries.push(Entry { pattern, rule });
            }
        }
        Ok(())
    }

    /// First rule whose pattern matches `url`, for any method
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<&MockRule> {
        self.resolve_request(HttpMethod::Any, url)
    }

    /// First rule matching both method and URL
    #[must_use]
    pub fn resolve_request(&self, method: HttpMethod, url: &str) -> Option<&MockRule> {
        self.entries
            .iter()
            .find(|e| e.rule.method.matches(&method) && e.pattern.matches(url))
            .map(|e| &e.rule)
    }

    /// Resolve a live request and record the decision in `log`
    pub fn intercept(
        &self,
        method: HttpMethod,
        url: &str,
        log: &InterceptionLog,
    ) -> Option<&MockRule> {
        let rule = self.resolve_request(method, url);
        match rule {
            Some(rule) => {
                tracing::debug!(%method, url, pattern = %rule.url_pattern, status = rule.status, "serving mock");
            }
            None => tracing::debug!(%method, url, "passing request through"),
        }
        log.record(InterceptedRequest {
            method,
            url: url.to_string(),
            matched: rule.map(|r| r.url_pattern.clone()),
            status: rule.map(|r| r.status),
        });
        rule
    }

    /// Registered rules in priority order
    pub fn rules(&self) -> impl Iterator<Item = &MockRule> {
        self.entries.iter().map(|e| &e.rule)
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no rules are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    mod http_method_tests {
        use super::*;

        #[test]
        fn test_parse() {
            assert_eq!(HttpMethod::parse("get"), HttpMethod::Get);
            assert_eq!(HttpMethod::parse("POST"), HttpMethod::Post);
            assert_eq!(HttpMethod::parse("TRACE"), HttpMethod::Other);
            assert_eq!(HttpMethod::parse("PROPFIND"), HttpMethod::Other);
        }

        #[test]
        fn test_any_matches_everything() {
            assert!(HttpMethod::Any.matches(&HttpMethod::Delete));
            assert!(HttpMethod::Any.matches(&HttpMethod::Other));
            assert!(HttpMethod::Get.matches(&HttpMethod::Any));
            assert!(!HttpMethod::Get.matches(&HttpMethod::Post));
        }

        #[test]
        fn test_unknown_request_method_only_matches_any() {
            for filter in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Options] {
                assert!(!filter.matches(&HttpMethod::Other), "{filter}");
            }
        }
    }

    mod url_pattern_tests {
        use super::*;

        fn matches(pattern: &str, url: &str) -> bool {
            UrlPattern::parse(pattern).unwrap().matches(url)
        }

        #[test]
        fn test_double_star_crosses_segments() {
            assert!(matches("**/api/results", "http://localhost:3000/api/results"));
            assert!(!matches("**/api/results", "http://localhost:3000/api/results/1"));
        }

        #[test]
        fn test_single_star_stays_in_segment() {
            assert!(matches("/api/groups/*/details", "http://h/api/groups/7/details"));
            assert!(!matches("/api/groups/*/details", "http://h/api/groups/7/x/details"));
        }

        #[test]
        fn test_path_patterns_ignore_host_and_query() {
            assert!(matches("/api/schedule", "http://localhost:3000/api/schedule"));
            assert!(matches("/api/schedule", "https://x.test/api/schedule?day=2#top"));
            assert!(matches("/api/schedule", "/api/schedule"));
            assert!(!matches("/api/schedule", "http://localhost:3000/v2/api/schedule"));
        }

        #[test]
        fn test_question_mark_and_alternation() {
            assert!(matches("/api/{live,weather}", "http://h/api/live"));
            assert!(matches("/api/{live,weather}", "http://h/api/weather"));
            assert!(!matches("/api/{live,weather}", "http://h/api/results"));
            assert!(matches("/api/v?/x", "http://h/api/v2/x"));
        }

        #[test]
        fn test_regex_prefix_searches() {
            assert!(matches(r"re:/api/admin/(login|seed)$", "http://h/api/admin/seed"));
            assert!(!matches(r"re:/api/admin/(login|seed)$", "http://h/api/admin/other"));
        }

        #[test]
        fn test_regex_metacharacters_are_literal_in_globs() {
            assert!(matches("/a.b(c)", "http://h/a.b(c)"));
            assert!(!matches("/a.b", "http://h/axb"));
        }

        #[test]
        fn test_malformed_patterns_rejected() {
            for bad in ["", "   ", "/api/{a,b", "/api/a}", "/api/{a,{b}}", "re:", "re:(unclosed"] {
                let err = UrlPattern::parse(bad).unwrap_err();
                assert!(matches!(err, ProofError::Configuration { .. }), "{bad}");
            }
        }

        #[test]
        fn test_url_path() {
            assert_eq!(url_path("http://h:1/a/b?c=1"), "/a/b");
            assert_eq!(url_path("http://h"), "/");
            assert_eq!(url_path("/x#frag"), "/x");
        }
    }

    mod mock_rule_tests {
        use super::*;

        #[test]
        fn test_json_constructor() {
            let rule = MockRule::json("/api/live", &json!({"live": true}));
            assert_eq!(rule.status, 200);
            assert_eq!(rule.content_type, "application/json");
            assert_eq!(rule.body, r#"{"live":true}"#);
        }

        #[test]
        fn test_deserialize_inline_json_body() {
            let rule: MockRule = serde_yaml_ng::from_str(
                "url_pattern: /api/schedule\njson: [{apparatus: Sol}]\n",
            )
            .unwrap();
            assert_eq!(rule.body, r#"[{"apparatus":"Sol"}]"#);
            assert_eq!(rule.method, HttpMethod::Any);
            assert_eq!(rule.status, 200);
        }

        #[test]
        fn test_deserialize_literal_body_and_method() {
            let rule: MockRule = serde_yaml_ng::from_str(
                "url: /api/admin/login\nmethod: POST\nstatus: 401\ncontent_type: text/plain\nbody: nope\n",
            )
            .unwrap();
            assert_eq!(rule.method, HttpMethod::Post);
            assert_eq!(rule.status, 401);
            assert_eq!(rule.body, "nope");
        }

        #[test]
        fn test_body_and_json_conflict() {
            let result: Result<MockRule, _> =
                serde_yaml_ng::from_str("url: /x\nbody: a\njson: {}\n");
            assert!(result.is_err());
        }

        #[test]
        fn test_response_headers_put_content_type_first() {
            let rule = MockRule::new("/x", 200, "text/html", "")
                .with_header("content-type", "ignored")
                .with_header("X-Mock", "1");
            let headers = rule.response_headers();
            assert_eq!(headers[0], ("Content-Type".to_string(), "text/html".to_string()));
            assert_eq!(headers.len(), 2);
        }
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn test_first_registered_wins() {
            let registry = MockRegistry::from_rules([
                MockRule::new("**/api/*", 200, "application/json", "first"),
                MockRule::new("/api/live", 200, "application/json", "second"),
            ])
            .unwrap();
            assert_eq!(registry.resolve("http://h/api/live").unwrap().body, "first");
        }

        #[test]
        fn test_reregister_replaces_in_place() {
            let mut registry = MockRegistry::new();
            registry.register(MockRule::new("/api/live", 200, "application/json", "old")).unwrap();
            registry.register(MockRule::new("**", 500, "text/plain", "catch-all")).unwrap();
            registry.register(MockRule::new("/api/live", 200, "application/json", "new")).unwrap();
            assert_eq!(registry.len(), 2);
            assert_eq!(registry.resolve("http://h/api/live").unwrap().body, "new");
        }

        #[test]
        fn test_same_pattern_different_method_coexist() {
            let mut registry = MockRegistry::new();
            registry
                .register(MockRule::new("/api/admin/login", 200, "application/json", "ok").with_method(HttpMethod::Post))
                .unwrap();
            registry
                .register(MockRule::new("/api/admin/login", 405, "text/plain", "no").with_method(HttpMethod::Get))
                .unwrap();
            assert_eq!(registry.len(), 2);
            let post = registry.resolve_request(HttpMethod::Post, "http://h/api/admin/login");
            assert_eq!(post.unwrap().body, "ok");
            let get = registry.resolve_request(HttpMethod::Get, "http://h/api/admin/login");
            assert_eq!(get.unwrap().status, 405);
        }

        #[test]
        fn test_unknown_method_bypasses_method_filtered_rule() {
            let mut registry = MockRegistry::new();
            registry
                .register(MockRule::json("/api/x", &json!({})).with_method(HttpMethod::Get))
                .unwrap();
            let trace = HttpMethod::parse("TRACE");
            assert!(registry.resolve_request(trace, "http://h/api/x").is_none());
            assert!(registry.resolve_request(HttpMethod::Get, "http://h/api/x").is_some());

            registry.register(MockRule::json("/api/x", &json!([]))).unwrap();
            assert_eq!(registry.resolve_request(trace, "http://h/api/x").unwrap().body, "[]");
        }

        #[test]
        fn test_rule_cannot_filter_on_other() {
            let mut registry = MockRegistry::new();
            let err = registry
                .register(MockRule::json("/api/x", &json!({})).with_method(HttpMethod::Other))
                .unwrap_err();
            assert!(matches!(err, ProofError::Configuration { .. }));
        }

        #[test]
        fn test_unmatched_resolves_none() {
            let registry =
                MockRegistry::from_rules([MockRule::json("/api/live", &json!({}))]).unwrap();
            assert!(registry.resolve("http://h/api/weather").is_none());
        }

        #[test]
        fn test_bad_pattern_fails_at_registration() {
            let mut registry = MockRegistry::new();
            let err = registry
                .register(MockRule::new("/api/{oops", 200, "text/plain", ""))
                .unwrap_err();
            assert!(matches!(err, ProofError::Configuration { .. }));
            assert!(registry.is_empty());
        }

        #[test]
        fn test_bad_status_rejected() {
            let mut registry = MockRegistry::new();
            assert!(registry.register(MockRule::new("/x", 42, "text/plain", "")).is_err());
        }

        #[test]
        fn test_intercept_records_both_outcomes() {
            let registry =
                MockRegistry::from_rules([MockRule::json("/api/live", &json!({"live": 1}))]).unwrap();
            let log = InterceptionLog::new();
            assert!(registry.intercept(HttpMethod::Get, "http://h/api/live", &log).is_some());
            assert!(registry.intercept(HttpMethod::Get, "http://h/app.js", &log).is_none());

            let entries = log.entries();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].matched.as_deref(), Some("/api/live"));
            assert_eq!(entries[0].status, Some(200));
            assert!(!entries[1].was_mocked());
            assert_eq!(log.mocked().len(), 1);
        }

        #[test]
        fn test_log_clones_share_storage() {
            let log = InterceptionLog::new();
            let other = log.clone();
            other.record(InterceptedRequest {
                method: HttpMethod::Get,
                url: "u".to_string(),
                matched: None,
                status: None,
            });
            assert_eq!(log.len(), 1);
        }
    }

    proptest! {
        #[test]
        fn prop_literal_path_pattern_matches_itself(segments in prop::collection::vec("[a-z0-9_-]{1,8}", 1..5)) {
            let path = format!("/{}", segments.join("/"));
            let pattern = UrlPattern::parse(&path).unwrap();
            let url = format!("http://localhost:3000{path}");
            prop_assert!(pattern.matches(&url));
            let longer = format!("{url}/extra");
            prop_assert!(!pattern.matches(&longer));
        }

        #[test]
        fn prop_matched_request_gets_exact_rule(
            status in 100_u16..600,
            body in ".{0,40}",
            name in "[a-z]{1,10}",
        ) {
            let pattern = format!("/api/{name}");
            let registry = MockRegistry::from_rules([
                MockRule::new(pattern.clone(), status, "application/json", body.clone()),
            ]).unwrap();
            let rule = registry.resolve(&format!("http://h{pattern}")).unwrap();
            prop_assert_eq!(rule.status, status);
            prop_assert_eq!(&rule.body, &body);
            let unmatched = format!("http://h/other/{name}");
            prop_assert!(registry.resolve(&unmatched).is_none());
        }

        #[test]
        fn prop_first_registered_wins(bodies in prop::collection::vec("[a-z]{1,6}", 2..6)) {
            let registry = MockRegistry::from_rules(
                bodies.iter().enumerate().map(|(i, b)| {
                    MockRule::new(format!("**/api/{{x,z{i}}}"), 200, "text/plain", b.clone())
                }),
            ).unwrap();
            let rule = registry.resolve("http://h/api/x").unwrap();
            prop_assert_eq!(&rule.body, &bodies[0]);
        }
    }
}
