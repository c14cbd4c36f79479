//! Check-in HTTP client
//!
//! One `perform_checkin` call walks the fingerprint rotation: each profile
//! gets exactly one attempt, challenge-marked 403s and transport errors move
//! on to the next profile, and classification only ever runs on a response
//! from a profile the site did not reject. Exhausting the list is a
//! transient failure, never a credential verdict.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

use super::fingerprint::FingerprintProfile;
use super::outcome::{classify, CheckinResponse, Outcome};
use crate::session::SessionToken;
use crate::site::Site;

/// Result of one check-in call
#[derive(Debug, Clone)]
pub struct CheckinReport {
    pub outcome: Outcome,
    pub message: String,
}

impl CheckinReport {
    fn transient(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::TransientFailure,
            message: message.into(),
        }
    }
}

/// Site action client
pub struct CheckinClient {
    client: Client,
}

impl CheckinClient {
    pub fn new(timeout_secs: u64) -> Result<Self, reqwest::Error> {
        // No cookie store: the session travels as an explicit Cookie header
        // so one client can serve every account.
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    /// Perform the check-in action with `token` against `site`.
    pub async fn perform_checkin(
        &self,
        token: &SessionToken,
        site: &Site,
        randomize: bool,
    ) -> CheckinReport {
        let url = site.attendance_url(randomize);

        for profile in FingerprintProfile::rotation() {
            let request = self
                .client
                .post(&url)
                .header("Origin", &site.origin)
                .header("Referer", &site.referer)
                .header("Content-Type", "application/json")
                .header("Cookie", token.as_str())
                .json(&json!({}));
            let request = profile.apply(request);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!("[{}] profile {} transport error: {}", site.name, profile.name, e);
                    continue;
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!("[{}] profile {} body read error: {}", site.name, profile.name, e);
                    continue;
                }
            };

            if status == StatusCode::FORBIDDEN && body.to_lowercase().contains("challenge") {
                // Fingerprint rejection, not a verdict about the session
                debug!("[{}] profile {} rejected by bot challenge", site.name, profile.name);
                continue;
            }

            let parsed: CheckinResponse = match serde_json::from_str(&body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(
                        "[{}] profile {} returned non-JSON body ({}): {}",
                        site.name,
                        profile.name,
                        e,
                        truncate(&body, 120)
                    );
                    continue;
                }
            };

            let (outcome, message) = classify(&parsed);
            info!(
                "[{}] check-in via {} -> {} ({})",
                site.name, profile.name, outcome, message
            );
            return CheckinReport { outcome, message };
        }

        warn!("[{}] all fingerprint profiles exhausted", site.name);
        CheckinReport::transient("请求失败")
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("鸡腿鸡腿", 2), "鸡腿");
        assert_eq!(truncate("ab", 10), "ab");
    }
}
