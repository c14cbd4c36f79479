//! Run configuration
//!
//! Built exactly once in `main` from the process environment (the contract a
//! QingLong-style host scheduler provides) and passed down by reference. No
//! other module reads environment variables.

use std::path::PathBuf;

/// Telegram notification settings
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// A username/password pair from `NODESEEK_ACCOUNT`
#[derive(Debug, Clone)]
pub struct PasswordCredential {
    pub username: String,
    pub password: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit primary-site session tokens, in configuration order
    pub cookies: Vec<String>,
    /// Username/password pairs, in configuration order
    pub credentials: Vec<PasswordCredential>,
    /// Explicit secondary-site (DeepFlood) session token
    pub deepflood_cookie: Option<String>,
    /// Toggle for the site's randomized check-in reward
    pub randomize: bool,
    /// YesCaptcha API key; enables the API login strategy
    pub yescaptcha_key: Option<String>,
    /// Alternate solver API base (self-hosted relay, or a mock in tests)
    pub yescaptcha_api_base: Option<String>,
    /// Telegram notification target, if configured
    pub telegram: Option<TelegramConfig>,
    /// Bounded fan-out across accounts (1 = sequential)
    pub concurrency: usize,
    /// Exit non-zero when no check-in succeeded
    pub strict_exit: bool,
    /// Run the fallback browser login headless
    pub headless: bool,
    /// Explicit Chrome/Chromium executable path
    pub chrome_path: Option<String>,
    /// Credential store file override (defaults to the platform config dir)
    pub store_path: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup function. Split out so tests can feed
    /// variables without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cookies = non_empty("NODESEEK_COOKIE")
            .map(|raw| split_multi(&raw))
            .unwrap_or_default();

        let credentials = non_empty("NODESEEK_ACCOUNT")
            .map(|raw| {
                split_multi(&raw)
                    .iter()
                    .filter_map(|entry| parse_credential(entry))
                    .collect()
            })
            .unwrap_or_default();

        let randomize = non_empty("NODESEEK_RANDOM")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        // Two historical names for the same key
        let yescaptcha_key = non_empty("YESCAPTCHA_KEY").or_else(|| non_empty("YESCAPTCHA_API_KEY"));

        let telegram = match (non_empty("TELEGRAM_BOT_TOKEN"), non_empty("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            _ => None,
        };

        let concurrency = non_empty("CHECKIN_CONCURRENCY")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n >= 1)
            .unwrap_or(1);

        let strict_exit = non_empty("CHECKIN_STRICT_EXIT")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let headless = non_empty("CHECKIN_HEADLESS")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Self {
            cookies,
            credentials,
            deepflood_cookie: non_empty("DEEPFLOOD_COOKIE"),
            randomize,
            yescaptcha_key,
            yescaptcha_api_base: non_empty("YESCAPTCHA_API_BASE"),
            telegram,
            concurrency,
            strict_exit,
            headless,
            chrome_path: non_empty("CHECKIN_CHROME_PATH"),
            store_path: non_empty("CHECKIN_STORE_PATH").map(PathBuf::from),
        }
    }

    /// Whether any credential source is configured at all
    pub fn has_any_credential(&self) -> bool {
        !self.cookies.is_empty() || !self.credentials.is_empty()
    }
}

/// Split a '&'-delimited multi-account value, dropping empty entries.
fn split_multi(raw: &str) -> Vec<String> {
    raw.split('&')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `user:pass`; the password may itself contain ':'.
fn parse_credential(entry: &str) -> Option<PasswordCredential> {
    let (username, password) = entry.split_once(':')?;
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some(PasswordCredential {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_empty_environment() {
        let config = config_from(&[]);
        assert!(config.cookies.is_empty());
        assert!(config.credentials.is_empty());
        assert!(config.randomize);
        assert!(!config.strict_exit);
        assert_eq!(config.concurrency, 1);
        assert!(!config.has_any_credential());
    }

    #[test]
    fn parses_multiple_accounts_and_cookies() {
        let config = config_from(&[
            ("NODESEEK_COOKIE", "smac=a1 & smac=b2"),
            ("NODESEEK_ACCOUNT", "alice:pw1&bob:p:w:2"),
        ]);
        assert_eq!(config.cookies, vec!["smac=a1", "smac=b2"]);
        assert_eq!(config.credentials.len(), 2);
        assert_eq!(config.credentials[0].username, "alice");
        // Passwords keep embedded colons
        assert_eq!(config.credentials[1].password, "p:w:2");
    }

    #[test]
    fn yescaptcha_key_falls_back_to_legacy_name() {
        let config = config_from(&[("YESCAPTCHA_API_KEY", "k-123")]);
        assert_eq!(config.yescaptcha_key.as_deref(), Some("k-123"));

        let config = config_from(&[
            ("YESCAPTCHA_KEY", "primary"),
            ("YESCAPTCHA_API_KEY", "legacy"),
        ]);
        assert_eq!(config.yescaptcha_key.as_deref(), Some("primary"));
    }

    #[test]
    fn telegram_requires_both_token_and_chat_id() {
        let config = config_from(&[("TELEGRAM_BOT_TOKEN", "t")]);
        assert!(config.telegram.is_none());

        let config = config_from(&[("TELEGRAM_BOT_TOKEN", "t"), ("TELEGRAM_CHAT_ID", "42")]);
        assert!(config.telegram.is_some());
    }

    #[test]
    fn malformed_credentials_are_skipped() {
        let config = config_from(&[("NODESEEK_ACCOUNT", "nopassword&:only-pass&ok:pw")]);
        assert_eq!(config.credentials.len(), 1);
        assert_eq!(config.credentials[0].username, "ok");
    }
}
