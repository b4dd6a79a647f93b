use cookie::Cookie;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use url::Url;

/// One cookie as kept by the jar. Attributes the portal never uses (path,
/// secure, same-site) are dropped at parse time.
#[derive(Debug, Clone)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub expires_at: Option<OffsetDateTime>,
}

/// Per-domain, expiry-aware cookie collection for one authenticated session.
///
/// Scoping is a plain host-suffix match: a cookie stored for `example.com`
/// applies to `sso.example.com`. That is what the portal relies on to carry
/// its session token across subdomain hops, so the jar implements exactly
/// that and nothing stricter.
///
/// The jar lives for one scheduled run and is rebuilt fresh for the next, so
/// a `Vec` with linear scans is the intended shape; there is no eviction
/// beyond the put-time expiry filter.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and store `Set-Cookie` header values received for `url`.
    ///
    /// Cookies that are already expired (an expiry in the past, or an
    /// explicit non-positive `Max-Age`) are discarded. A cookie without an
    /// expiry is session-scoped and always accepted. An absent domain
    /// defaults to the request host.
    pub fn put<'a, I>(&mut self, url: &Url, set_cookie_lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let now = OffsetDateTime::now_utc();
        for line in set_cookie_lines {
            let parsed = match Cookie::parse(line) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(%err, "ignoring unparseable set-cookie header");
                    continue;
                }
            };
            let expires_at = match parsed.max_age() {
                // expired at the client
                Some(age) if age <= Duration::ZERO => continue,
                Some(age) => Some(now + age),
                None => parsed.expires().and_then(|at| at.datetime()),
            };
            if expires_at.is_some_and(|at| at < now) {
                continue;
            }
            let domain = parsed
                .domain()
                .map(|domain| domain.trim_start_matches('.').to_ascii_lowercase())
                .filter(|domain| !domain.is_empty())
                .unwrap_or_else(|| url.host_str().unwrap_or_default().to_ascii_lowercase());
            self.cookies.push(StoredCookie {
                name: parsed.name().to_string(),
                value: parsed.value().to_string(),
                domain,
                expires_at,
            });
        }
    }

    /// All cookies whose domain is a suffix of the request host.
    pub fn get(&self, url: &Url) -> Vec<&StoredCookie> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.cookies
            .iter()
            .filter(|cookie| host.ends_with(&cookie.domain))
            .collect()
    }

    /// Matching cookies rendered as a `Cookie` request header value.
    pub fn header_value(&self, url: &Url) -> Option<String> {
        let matched = self.get(url);
        if matched.is_empty() {
            return None;
        }
        Some(
            matched
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// First cookie with the given name, regardless of domain. Probe for the
    /// authentication session token.
    pub fn get_by_name(&self, name: &str) -> Option<&StoredCookie> {
        self.cookies.iter().find(|cookie| cookie.name == name)
    }

    /// First cookie whose domain ends with `domain`. Probe for the report
    /// subsystem's session cookie.
    pub fn get_by_domain_suffix(&self, domain: &str) -> Option<&StoredCookie> {
        self.cookies.iter().find(|cookie| cookie.domain.ends_with(domain))
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_put_get_roundtrip() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://portal.example.com/login"), ["token=abc; Path=/"]);
        let got = jar.get(&url("http://portal.example.com/"));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "token");
        assert_eq!(got[0].value, "abc");
        assert_eq!(got[0].domain, "portal.example.com");
    }

    #[test]
    fn test_expired_cookie_never_stored() {
        let mut jar = CookieJar::new();
        jar.put(
            &url("http://example.com"),
            ["old=1; Expires=Thu, 01 Jan 2015 00:00:00 GMT"],
        );
        assert!(jar.get(&url("http://example.com")).is_empty());
    }

    #[test]
    fn test_non_positive_max_age_never_stored() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://example.com"), ["gone=1; Max-Age=-1", "alsogone=1; Max-Age=0"]);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_session_cookie_always_accepted() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://example.com"), ["sess=1"]);
        assert_eq!(jar.len(), 1);
        assert!(jar.get(&url("http://example.com"))[0].expires_at.is_none());
    }

    #[test]
    fn test_future_max_age_kept() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://example.com"), ["keep=1; Max-Age=3600"]);
        let got = jar.get(&url("http://example.com"));
        assert_eq!(got.len(), 1);
        assert!(got[0].expires_at.is_some());
    }

    #[test]
    fn test_domain_suffix_match() {
        let mut jar = CookieJar::new();
        jar.put(
            &url("http://sso.example.com"),
            ["shared=1; Domain=example.com"],
        );
        assert_eq!(jar.get(&url("http://sso.example.com")).len(), 1);
        assert_eq!(jar.get(&url("http://report.example.com")).len(), 1);
        assert_eq!(jar.get(&url("http://example.com")).len(), 1);
        assert!(jar.get(&url("http://example.org")).is_empty());
    }

    #[test]
    fn test_empty_domain_defaults_to_host() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://sso.example.com"), ["scoped=1"]);
        assert_eq!(jar.get(&url("http://sso.example.com")).len(), 1);
        // host-scoped cookie does not apply to a sibling host
        assert!(jar.get(&url("http://report.example.com")).is_empty());
    }

    #[test]
    fn test_get_by_name() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://example.com"), ["a=1", "b=2"]);
        assert_eq!(jar.get_by_name("b").unwrap().value, "2");
        assert!(jar.get_by_name("c").is_none());
    }

    #[test]
    fn test_get_by_domain_suffix() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://report.example.com"), ["sess=1"]);
        assert!(jar.get_by_domain_suffix("example.com").is_some());
        assert!(jar.get_by_domain_suffix("example.org").is_none());
    }

    #[test]
    fn test_header_value_joins_pairs() {
        let mut jar = CookieJar::new();
        jar.put(&url("http://example.com"), ["a=1", "b=2"]);
        assert_eq!(
            jar.header_value(&url("http://example.com")).unwrap(),
            "a=1; b=2"
        );
        assert!(jar.header_value(&url("http://example.org")).is_none());
    }
}
