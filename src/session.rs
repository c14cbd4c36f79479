//! Session tokens
//!
//! A session is an opaque serialized cookie set. The external wire format is
//! a semicolon-joined `name=value` list because that is exactly what the
//! sites expect in the `Cookie` header; everything else treats the token as
//! opaque.

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

/// Opaque session token for one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw cookie string supplied by configuration
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Serialize the cookies a jar has accumulated for `url`.
    ///
    /// `Jar::cookies` already renders the `Cookie` header value, which is the
    /// same `name=value; name2=value2` format the token uses on the wire.
    pub fn from_jar(jar: &Jar, url: &Url) -> Option<Self> {
        let header = jar.cookies(url)?;
        let value = header.to_str().ok()?.to_string();
        Self::new(value)
    }

    /// Build a token from individual cookie pairs (browser context harvest)
    pub fn from_cookie_pairs<I, N, V>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let joined = pairs
            .into_iter()
            .map(|(name, value)| format!("{}={}", name.as_ref(), value.as_ref()))
            .collect::<Vec<_>>()
            .join("; ");
        Self::new(joined)
    }

    /// The raw `Cookie` header value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionToken {
    /// Tokens are secrets; display only a short prefix.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown: String = self.0.chars().take(12).collect();
        write!(f, "{}... ({} chars)", shown, self.0.len())
    }
}
