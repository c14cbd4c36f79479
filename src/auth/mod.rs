//! Login strategies
//!
//! Both re-authentication paths sit behind the same `LoginStrategy`
//! interface so the orchestrator never cares whether a session was minted
//! through the sign-in API or a headless browser, and so the browser path
//! can be compiled out entirely (cargo feature `browser`).

mod api;
#[cfg(feature = "browser")]
mod browser;

pub use api::ApiLogin;
#[cfg(feature = "browser")]
pub use browser::BrowserLogin;

use crate::captcha::CaptchaError;
use crate::session::SessionToken;
use crate::site::Site;

/// Login error types
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("challenge failed: {0}")]
    Challenge(#[from] CaptchaError),

    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no session cookies after login")]
    NoCookies,

    #[cfg(feature = "browser")]
    #[error("browser automation error: {0}")]
    Browser(String),
}

impl LoginError {
    /// Whether the failure is attributable to the challenge step
    /// (reported upstream as `challenge-failed` rather than `login-failed`).
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Challenge(_))
    }
}

/// A way to mint a fresh session from a username/password pair.
#[allow(async_fn_in_trait)]
pub trait LoginStrategy {
    async fn login(
        &self,
        site: &Site,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, LoginError>;
}

/// Runtime-selected strategy
pub enum Strategy {
    /// Remote challenge solving plus the sign-in API
    Api(ApiLogin),
    /// End-to-end headless browser login
    #[cfg(feature = "browser")]
    Browser(BrowserLogin),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Api(_) => "api",
            #[cfg(feature = "browser")]
            Self::Browser(_) => "browser",
        }
    }
}

impl LoginStrategy for Strategy {
    async fn login(
        &self,
        site: &Site,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, LoginError> {
        match self {
            Self::Api(inner) => inner.login(site, username, password).await,
            #[cfg(feature = "browser")]
            Self::Browser(inner) => inner.login(site, username, password).await,
        }
    }
}
