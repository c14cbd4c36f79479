//! API password login
//!
//! Solves the Turnstile challenge through the remote service, establishes a
//! fresh client session with a warm-up GET of the sign-in page, then POSTs
//! credentials plus the challenge token to the sign-in API. No internal
//! retries; retry policy belongs to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use super::{LoginError, LoginStrategy};
use crate::captcha::CaptchaSolver;
use crate::session::SessionToken;
use crate::site::{Site, TURNSTILE_SITEKEY};

const LOGIN_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15";

/// Sign-in API response body
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignInResponse {
    success: Option<bool>,
    message: Option<String>,
}

/// Password login through the sign-in API
pub struct ApiLogin {
    solver: CaptchaSolver,
    timeout: Duration,
}

impl ApiLogin {
    pub fn new(solver: CaptchaSolver) -> Self {
        Self {
            solver,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl LoginStrategy for ApiLogin {
    async fn login(
        &self,
        site: &Site,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, LoginError> {
        let signin_page = site.signin_page_url();
        let challenge = self
            .solver
            .solve_turnstile(&signin_page, TURNSTILE_SITEKEY)
            .await?;

        // Fresh jar per login so cookies never leak across accounts
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(self.timeout)
            .cookie_provider(jar.clone())
            .user_agent(LOGIN_USER_AGENT)
            .build()
            .map_err(|e| LoginError::Network(e.to_string()))?;

        // Warm-up GET for baseline cookies
        client
            .get(&signin_page)
            .send()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        let response = client
            .post(site.signin_api_url())
            .header("Origin", &site.origin)
            .header("Referer", &signin_page)
            .json(&json!({
                "username": username,
                "password": password,
                "token": challenge.token,
                "source": "turnstile",
            }))
            .send()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| LoginError::Network(e.to_string()))?;

        if body.success != Some(true) {
            let reason = body.message.unwrap_or_else(|| "unknown reason".into());
            warn!("[{}] sign-in rejected: {}", site.name, reason);
            return Err(LoginError::Rejected(reason));
        }

        let base: Url = site
            .base_url
            .parse()
            .map_err(|e| LoginError::Network(format!("bad site URL: {}", e)))?;
        let token = SessionToken::from_jar(&jar, &base).ok_or(LoginError::NoCookies)?;

        info!("[{}] sign-in succeeded for {}", site.name, username);
        Ok(token)
    }
}
