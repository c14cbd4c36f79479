//! YesCaptcha Turnstile solver
//!
//! Submits a TurnstileTaskProxyless task and polls for the result a fixed
//! number of times. Any failure (creation error, poll exhaustion, transport
//! error) is a hard stop for the caller's current login attempt; the solver
//! is never retried within a run.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, info, warn};

use super::types::*;

/// YesCaptcha API base URL
const YESCAPTCHA_API: &str = "https://api.yescaptcha.com";

/// Default polling schedule: 40 attempts, 3 seconds apart
const DEFAULT_POLL_ATTEMPTS: u32 = 40;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Turnstile solver backed by the YesCaptcha task API
pub struct CaptchaSolver {
    api_key: String,
    client: Client,
    api_base: String,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl CaptchaSolver {
    /// Create a new solver
    pub fn new(api_key: &str) -> Result<Self, CaptchaError> {
        if api_key.is_empty() {
            return Err(CaptchaError::ApiKeyMissing);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CaptchaError::NetworkError(e.to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            client,
            api_base: YESCAPTCHA_API.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        })
    }

    /// Point the solver at a different API base (mock server in tests)
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the polling attempt ceiling
    pub fn with_poll_attempts(mut self, attempts: u32) -> Self {
        self.poll_attempts = attempts.max(1);
        self
    }

    /// Solve a Turnstile challenge for the given page.
    pub async fn solve_turnstile(
        &self,
        page_url: &str,
        site_key: &str,
    ) -> Result<CaptchaResult, CaptchaError> {
        let start = Instant::now();
        info!("solving Turnstile for {}", page_url);

        let task_id = self.create_task(page_url, site_key).await?;
        debug!("created solver task {}", task_id);

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match self.get_result(&task_id).await? {
                Some(token) => {
                    let solve_time_ms = start.elapsed().as_millis() as u64;
                    info!("Turnstile solved in {}ms", solve_time_ms);
                    return Ok(CaptchaResult { token, solve_time_ms });
                }
                None => debug!("task {} still processing (attempt {})", task_id, attempt),
            }
        }

        warn!("Turnstile solve exhausted {} polling attempts", self.poll_attempts);
        Err(CaptchaError::Timeout(self.poll_attempts))
    }

    async fn create_task(&self, page_url: &str, site_key: &str) -> Result<String, CaptchaError> {
        let request = CreateTaskRequest {
            client_key: self.api_key.clone(),
            task: SolverTask::TurnstileProxyless {
                website_url: page_url.to_string(),
                website_key: site_key.to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/createTask", self.api_base))
            .json(&request)
            .send()
            .await
            .map_err(|e| CaptchaError::NetworkError(e.to_string()))?;

        let result: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::InvalidResponse(e.to_string()))?;

        if result.error_id != 0 {
            let reason = result
                .error_description
                .or(result.error_code)
                .unwrap_or_else(|| format!("errorId={}", result.error_id));
            return Err(CaptchaError::TaskCreationFailed(reason));
        }

        result
            .task_id_string()
            .ok_or_else(|| CaptchaError::InvalidResponse("no task ID in response".into()))
    }

    async fn get_result(&self, task_id: &str) -> Result<Option<String>, CaptchaError> {
        let request = GetResultRequest {
            client_key: self.api_key.clone(),
            task_id: task_id.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/getTaskResult", self.api_base))
            .json(&request)
            .send()
            .await
            .map_err(|e| CaptchaError::NetworkError(e.to_string()))?;

        let result: GetResultResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::InvalidResponse(e.to_string()))?;

        if result.error_id != 0 {
            let reason = result
                .error_description
                .unwrap_or_else(|| format!("errorId={}", result.error_id));
            return Err(CaptchaError::TaskCreationFailed(reason));
        }

        if result.is_ready() {
            if let Some(token) = result.token() {
                return Ok(Some(token.to_string()));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_rejected() {
        assert!(matches!(
            CaptchaSolver::new(""),
            Err(CaptchaError::ApiKeyMissing)
        ));
    }

    #[test]
    fn api_base_override_trims_slash() {
        let solver = CaptchaSolver::new("k").unwrap().with_api_base("http://127.0.0.1:1/");
        assert_eq!(solver.api_base, "http://127.0.0.1:1");
    }
}
