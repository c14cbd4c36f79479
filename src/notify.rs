//! Telegram notification push
//!
//! One fire-and-forget `sendMessage` call with the run summary. Delivery
//! failures are logged and swallowed; they never affect the run's own
//! success determination.

use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::TelegramConfig;

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct Notifier {
    config: TelegramConfig,
    client: Client,
    api_base: String,
}

impl Notifier {
    pub fn new(config: TelegramConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            config,
            client,
            api_base: TELEGRAM_API.to_string(),
        })
    }

    /// Point at a different API base (mock server in tests)
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Push the summary; errors are logged and swallowed.
    pub async fn send_summary(&self, text: &str) {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.config.bot_token);
        let result = self
            .client
            .post(&url)
            .form(&[
                ("chat_id", self.config.chat_id.as_str()),
                ("text", text),
                ("parse_mode", "HTML"),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!("summary notification delivered");
            }
            Ok(response) => {
                warn!("notification rejected with status {}", response.status());
            }
            Err(e) => {
                warn!("notification delivery failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_form_encoded_message_to_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bott-123/sendMessage"))
            .and(body_string_contains("chat_id=42"))
            .and(body_string_contains("parse_mode=HTML"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(TelegramConfig {
            bot_token: "t-123".into(),
            chat_id: "42".into(),
        })
        .unwrap()
        .with_api_base(&server.uri());
        notifier.send_summary("签到完成").await;
    }

    #[tokio::test]
    async fn delivery_failure_does_not_panic() {
        let notifier = Notifier::new(TelegramConfig {
            bot_token: "t".into(),
            chat_id: "1".into(),
        })
        .unwrap()
        .with_api_base("http://127.0.0.1:1");
        notifier.send_summary("text").await;
    }
}
