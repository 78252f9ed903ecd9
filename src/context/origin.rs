//! Origin policy for outbound trace headers.
//!
//! # Responsibilities
//! - Decide whether a target URL may receive trace headers
//! - Treat same-origin targets as always allowed
//! - Match cross-origin hostnames against an allow-list
//!
//! # Design Decisions
//! - Hostname patterns are suffix matchers, not regexes (O(n), no engine)
//! - An empty allow-list allows everything: restriction is an explicit opt-in
//! - Unresolvable targets fail open and are logged for audit

use url::Url;

/// Hostname matcher for allow-list entries.
///
/// `example.com` matches `example.com` and any subdomain of it;
/// `*.example.com` is accepted as the same spelling. Matching is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern(String);

impl HostPattern {
    pub fn new(pattern: impl AsRef<str>) -> Self {
        let normalized = pattern
            .as_ref()
            .trim()
            .trim_start_matches("*.")
            .to_ascii_lowercase();
        Self(normalized)
    }

    /// Returns true if the hostname matches this pattern.
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.0
            || host
                .strip_suffix(&self.0)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// Allow-list policy evaluated against the application's own origin.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    origin: Url,
    patterns: Vec<HostPattern>,
}

impl OriginPolicy {
    pub fn new(origin: Url, patterns: Vec<HostPattern>) -> Self {
        Self { origin, patterns }
    }

    /// Returns true if `target` may receive trace headers.
    ///
    /// Relative references resolve against the own origin and are therefore
    /// always allowed. Absolute targets that cannot be parsed are allowed
    /// too, with a warning for auditability.
    pub fn is_allowed(&self, target: &str) -> bool {
        let url = match Url::parse(target) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => return true,
            Err(error) => {
                tracing::warn!(url = target, %error, "unparseable target URL; allowing trace headers");
                return true;
            }
        };

        if self.same_origin(&url) {
            return true;
        }
        if self.patterns.is_empty() {
            return true;
        }
        let Some(host) = url.host_str() else {
            tracing::warn!(url = target, "target URL has no host; allowing trace headers");
            return true;
        };
        self.patterns.iter().any(|pattern| pattern.matches(host))
    }

    fn same_origin(&self, url: &Url) -> bool {
        url.scheme() == self.origin.scheme()
            && url.host_str() == self.origin.host_str()
            && url.port_or_known_default() == self.origin.port_or_known_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(patterns: &[&str]) -> OriginPolicy {
        OriginPolicy::new(
            Url::parse("https://app.example.org").unwrap(),
            patterns.iter().map(HostPattern::new).collect(),
        )
    }

    #[test]
    fn test_empty_allow_list_allows_everything() {
        let policy = policy(&[]);
        assert!(policy.is_allowed("https://evil.com/steal"));
        assert!(policy.is_allowed("http://10.0.0.1:9999"));
        assert!(policy.is_allowed(":::not a url"));
    }

    #[test]
    fn test_pattern_matches_apex_and_subdomains() {
        let policy = policy(&["example.com"]);
        assert!(policy.is_allowed("https://example.com/api"));
        assert!(policy.is_allowed("https://other.example.com/api"));
        assert!(!policy.is_allowed("https://evil.com/api"));
        assert!(!policy.is_allowed("https://notexample.com/api"));
    }

    #[test]
    fn test_wildcard_spelling() {
        let pattern = HostPattern::new("*.example.com");
        assert!(pattern.matches("api.example.com"));
        assert!(pattern.matches("EXAMPLE.COM"));
        assert!(!pattern.matches("example.com.evil.net"));
    }

    #[test]
    fn test_same_origin_always_allowed() {
        let policy = policy(&["somewhere-else.net"]);
        assert!(policy.is_allowed("https://app.example.org/api/users"));
        // Explicit default port resolves to the same origin.
        assert!(policy.is_allowed("https://app.example.org:443/api/users"));
        // Same host, different scheme is a different origin.
        assert!(!policy.is_allowed("http://app.example.org/api/users"));
    }

    #[test]
    fn test_relative_targets_are_allowed() {
        let policy = policy(&["somewhere-else.net"]);
        assert!(policy.is_allowed("/api/users"));
        assert!(policy.is_allowed("api/users?page=2"));
    }

    #[test]
    fn test_hostless_target_fails_open() {
        let policy = policy(&["somewhere-else.net"]);
        assert!(policy.is_allowed("data:text/plain,hello"));
    }
}
