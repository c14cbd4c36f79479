//! Cross-site federation
//!
//! Exchanges a valid primary-site session for a secondary-site session: the
//! primary's cAuth endpoint hands out a signed payload which the secondary's
//! federated sign-in endpoint accepts. The handoff channel is rate-limited
//! server-side, so channel-level blocks are reported distinctly from payload
//! failures — one means "try again later", the other "fix the credentials".

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::session::SessionToken;
use crate::site::Site;

const FEDERATION_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15";

/// Federation error types
#[derive(Debug, thiserror::Error)]
pub enum FederationError {
    /// The handoff channel itself rejected us (access denied), typically
    /// upstream anti-bot or rate limiting in front of the endpoint.
    #[error("cross-site authorization channel blocked (access denied); retry later")]
    ChannelBlocked,

    /// The primary reported the daily handoff quota as used up.
    #[error("federation rate limited: {0}")]
    RateLimited(String),

    /// The primary refused to issue a handoff payload.
    #[error("handoff rejected: {0}")]
    HandoffRejected(String),

    /// The secondary refused the signed payload.
    #[error("federated sign-in rejected: {0}")]
    SignInRejected(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("no session cookies after federated sign-in")]
    NoCookies,
}

impl FederationError {
    /// Rate limiting means further federation attempts this run are pointless.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::ChannelBlocked)
    }
}

/// cAuth handoff payload
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CAuthResponse {
    success: Option<bool>,
    message: Option<String>,
    data: Option<serde_json::Value>,
    wtf: Option<serde_json::Value>,
    sign: Option<serde_json::Value>,
}

/// Federation strategy client
pub struct FederationClient {
    client: Client,
    timeout: Duration,
}

impl FederationClient {
    pub fn new(timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(FEDERATION_USER_AGENT)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Exchange a primary-site session for a secondary-site session.
    pub async fn federate(
        &self,
        primary: &Site,
        secondary: &Site,
        primary_token: &SessionToken,
    ) -> Result<SessionToken, FederationError> {
        info!(
            "[{}] requesting cross-site handoff for {}",
            primary.name, secondary.name
        );

        let response = self
            .client
            .get(primary.cauth_url(secondary.name))
            .header("Cookie", primary_token.as_str())
            .header("Origin", &primary.origin)
            .header(
                "Referer",
                format!("{}/connect?target={}", primary.base_url, secondary.name),
            )
            .send()
            .await
            .map_err(|e| FederationError::Network(e.to_string()))?;

        if response.status() == StatusCode::FORBIDDEN {
            warn!("[{}] cAuth blocked with 403", primary.name);
            return Err(FederationError::ChannelBlocked);
        }

        let handoff: CAuthResponse = response
            .json()
            .await
            .map_err(|e| FederationError::Network(e.to_string()))?;

        if handoff.success != Some(true) {
            let message = handoff.message.unwrap_or_else(|| "no message".into());
            // The primary caps cross-site handoffs at 10 per day
            if message.contains("10次") || message.contains("10 times") {
                warn!("[{}] federation quota exhausted: {}", primary.name, message);
                return Err(FederationError::RateLimited(message));
            }
            return Err(FederationError::HandoffRejected(message));
        }

        let (data, wtf, sign) = match (handoff.data, handoff.wtf, handoff.sign) {
            (Some(data), Some(wtf), Some(sign)) => (data, wtf, sign),
            _ => {
                return Err(FederationError::HandoffRejected(
                    "incomplete handoff payload".into(),
                ))
            }
        };

        self.redeem(secondary, data, wtf, sign).await
    }

    /// Present the signed payload at the secondary site with a fresh session.
    async fn redeem(
        &self,
        secondary: &Site,
        data: serde_json::Value,
        wtf: serde_json::Value,
        sign: serde_json::Value,
    ) -> Result<SessionToken, FederationError> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(self.timeout)
            .cookie_provider(jar.clone())
            .user_agent(FEDERATION_USER_AGENT)
            .build()
            .map_err(|e| FederationError::Network(e.to_string()))?;

        // Warm-up GET for baseline cookies
        client
            .get(format!("{}/", secondary.base_url))
            .send()
            .await
            .map_err(|e| FederationError::Network(e.to_string()))?;

        let response = client
            .post(secondary.federated_signin_url())
            .header("Origin", &secondary.origin)
            .header("Referer", secondary.federated_signin_referer())
            .json(&json!({ "data": data, "wtf": wtf, "sign": sign }))
            .send()
            .await
            .map_err(|e| FederationError::Network(e.to_string()))?;

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct FederatedSignIn {
            success: Option<bool>,
            message: Option<String>,
        }

        let body: FederatedSignIn = response
            .json()
            .await
            .map_err(|e| FederationError::Network(e.to_string()))?;

        if body.success != Some(true) {
            return Err(FederationError::SignInRejected(
                body.message.unwrap_or_else(|| "no message".into()),
            ));
        }

        let base: Url = secondary
            .base_url
            .parse()
            .map_err(|e| FederationError::Network(format!("bad site URL: {}", e)))?;
        let token = SessionToken::from_jar(&jar, &base).ok_or(FederationError::NoCookies)?;

        info!("[{}] federated sign-in succeeded", secondary.name);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_channel_block_stop_further_attempts() {
        assert!(FederationError::RateLimited("x".into()).is_rate_limited());
        assert!(FederationError::ChannelBlocked.is_rate_limited());
        assert!(!FederationError::HandoffRejected("x".into()).is_rate_limited());
    }
}
