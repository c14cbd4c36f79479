//! Site definitions
//!
//! Each target forum is described by its base URL plus the endpoint paths and
//! headers the check-in and sign-in calls require. Base URLs are plain fields
//! so tests can point a `Site` at a mock server.

/// Turnstile sitekey used on the NodeSeek sign-in page
pub const TURNSTILE_SITEKEY: &str = "0x4AAAAAAAaNy7leGjewpVyR";

/// A target forum site
#[derive(Debug, Clone)]
pub struct Site {
    /// Display name used in logs and the run summary
    pub name: &'static str,
    /// Base URL without trailing slash
    pub base_url: String,
    /// Origin header value (normally equals base_url)
    pub origin: String,
    /// Referer header value for the attendance call
    pub referer: String,
}

impl Site {
    /// NodeSeek, the primary site
    pub fn nodeseek() -> Self {
        Self::named("NodeSeek", "https://www.nodeseek.com")
    }

    /// DeepFlood, the federated secondary site
    pub fn deepflood() -> Self {
        Self::named("DeepFlood", "https://www.deepflood.com")
    }

    /// Build a site rooted at an arbitrary base URL (mock servers in tests)
    pub fn named(name: &'static str, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            name,
            origin: base.clone(),
            referer: format!("{}/board", base),
            base_url: base,
        }
    }

    /// Check-in endpoint, with the randomize flag as a query parameter
    pub fn attendance_url(&self, randomize: bool) -> String {
        format!("{}/api/attendance?random={}", self.base_url, randomize)
    }

    /// Sign-in page URL (warm-up GET target, also the Turnstile page URL)
    pub fn signin_page_url(&self) -> String {
        format!("{}/signIn.html", self.base_url)
    }

    /// Sign-in API endpoint
    pub fn signin_api_url(&self) -> String {
        format!("{}/api/account/signIn", self.base_url)
    }

    /// Cross-site authorization endpoint on the primary site
    pub fn cauth_url(&self, target: &str) -> String {
        format!("{}/api/cAuth?target={}", self.base_url, target)
    }

    /// Federated sign-in endpoint on the secondary site
    pub fn federated_signin_url(&self) -> String {
        format!("{}/api/account/nodeseek-signIn", self.base_url)
    }

    /// Referer for the federated sign-in POST
    pub fn federated_signin_referer(&self) -> String {
        format!("{}/nsSignIn.html", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_url_carries_random_flag() {
        let site = Site::nodeseek();
        assert_eq!(
            site.attendance_url(true),
            "https://www.nodeseek.com/api/attendance?random=true"
        );
        assert_eq!(
            site.attendance_url(false),
            "https://www.nodeseek.com/api/attendance?random=false"
        );
    }

    #[test]
    fn named_trims_trailing_slash() {
        let site = Site::named("Mock", "http://127.0.0.1:9000/");
        assert_eq!(site.base_url, "http://127.0.0.1:9000");
        assert_eq!(site.referer, "http://127.0.0.1:9000/board");
    }
}
