//! Run coordinator
//!
//! Builds the account list from configuration plus the credential store,
//! fans the orchestrator out across accounts with bounded ordered
//! concurrency, then aggregates outcomes, persists refreshed sessions and
//! pushes the summary notification. No single account's failure aborts the
//! others.

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::auth::{ApiLogin, Strategy};
use crate::captcha::CaptchaSolver;
use crate::checkin::CheckinClient;
use crate::config::Config;
use crate::federation::FederationClient;
use crate::notify::Notifier;
use crate::orchestrator::{Account, AccountReport, Orchestrator};
use crate::qinglong;
use crate::session::SessionToken;
use crate::site::Site;
use crate::store::CredentialStore;

/// Network timeout for site calls, in seconds
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Aggregated result of one run
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<AccountReport>,
}

impl RunSummary {
    /// How many (account, site) pairs are covered for `site`
    pub fn checked_in_count(&self, site: &str) -> usize {
        self.reports
            .iter()
            .flat_map(|r| &r.results)
            .filter(|r| r.site == site && r.outcome.is_checked_in())
            .count()
    }

    /// True when not a single (account, site) pair is covered
    pub fn all_failed(&self) -> bool {
        !self
            .reports
            .iter()
            .flat_map(|r| &r.results)
            .any(|r| r.outcome.is_checked_in())
    }

    /// Human-readable summary: site totals first, then literal per-account
    /// lines in processing order.
    pub fn render(&self, primary: &Site, secondary: &Site) -> String {
        let total = self.reports.len();
        let mut text = String::from("签到完成\n");
        for site in [primary, secondary] {
            let ok = self.checked_in_count(site.name);
            text.push_str(&format!(
                "{}: {} {}/{}\n",
                site.name,
                if ok > 0 { "✓" } else { "✗" },
                ok,
                total
            ));
        }
        for report in &self.reports {
            for result in &report.results {
                text.push_str(&format!(
                    "• [{}] {}: {} {}\n",
                    report.identifier, result.site, result.outcome, result.message
                ));
            }
        }
        text.trim_end().to_string()
    }
}

/// Merge explicit configuration with persisted sessions into the account
/// list for this run. Credentialed accounts come first (paired with cookies
/// by position), then any leftover cookie-only accounts.
pub fn build_accounts(config: &Config, store: &CredentialStore) -> Vec<Account> {
    let mut accounts = Vec::new();

    for (index, credential) in config.credentials.iter().enumerate() {
        let identifier = credential.username.clone();
        let token = config
            .cookies
            .get(index)
            .cloned()
            .or_else(|| store.primary_token(&identifier).map(str::to_string))
            .and_then(SessionToken::new);
        let secondary_token = config
            .deepflood_cookie
            .clone()
            .or_else(|| store.secondary_token(&identifier).map(str::to_string))
            .and_then(SessionToken::new);
        accounts.push(Account {
            identifier,
            token,
            credential: Some(credential.clone()),
            secondary_token,
        });
    }

    for (index, cookie) in config.cookies.iter().enumerate().skip(config.credentials.len()) {
        let identifier = format!("cookie-{}", index + 1);
        let secondary_token = config
            .deepflood_cookie
            .clone()
            .or_else(|| store.secondary_token(&identifier).map(str::to_string))
            .and_then(SessionToken::new);
        accounts.push(Account {
            identifier,
            token: SessionToken::new(cookie.clone()),
            credential: None,
            secondary_token,
        });
    }

    accounts
}

/// Select the login strategy for this run: remote solving plus the sign-in
/// API when a solver key is configured, otherwise the browser fallback.
fn select_strategy(config: &Config) -> anyhow::Result<Option<Strategy>> {
    if let Some(key) = config.yescaptcha_key.as_deref() {
        let mut solver = CaptchaSolver::new(key).context("building captcha solver")?;
        if let Some(base) = config.yescaptcha_api_base.as_deref() {
            solver = solver.with_api_base(base);
        }
        return Ok(Some(Strategy::Api(ApiLogin::new(solver))));
    }

    #[cfg(feature = "browser")]
    {
        return Ok(Some(Strategy::Browser(crate::auth::BrowserLogin::new(
            config.headless,
            config.chrome_path.clone(),
        ))));
    }

    #[allow(unreachable_code)]
    Ok(None)
}

/// Execute one full run against the real sites.
pub async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    let primary = Site::nodeseek();
    let secondary = Site::deepflood();
    run_against(config, &primary, &secondary).await
}

/// Execute one full run against explicit sites (tests point these at a mock
/// server).
pub async fn run_against(
    config: &Config,
    primary: &Site,
    secondary: &Site,
) -> anyhow::Result<RunSummary> {
    let store_path = config
        .store_path
        .clone()
        .or_else(CredentialStore::default_path)
        .context("no usable credential store location")?;
    let mut store = CredentialStore::load(&store_path);

    let accounts = build_accounts(config, &store);
    if accounts.is_empty() {
        error!("no accounts configured; set NODESEEK_COOKIE or NODESEEK_ACCOUNT");
        return Ok(RunSummary { reports: Vec::new() });
    }
    info!("processing {} account(s)", accounts.len());

    let checkin = CheckinClient::new(HTTP_TIMEOUT_SECS).context("building check-in client")?;
    let federation =
        FederationClient::new(HTTP_TIMEOUT_SECS).context("building federation client")?;
    let strategy = select_strategy(config)?;
    if let Some(ref s) = strategy {
        info!("login strategy: {}", s.name());
    } else {
        warn!("no login strategy available; expired sessions cannot be refreshed");
    }

    let orchestrator = Orchestrator::new(
        &checkin,
        &federation,
        strategy.as_ref(),
        primary,
        secondary,
        config.randomize,
    );

    // Ordered bounded fan-out: results come back in account order.
    let reports: Vec<AccountReport> = stream::iter(accounts.iter())
        .map(|account| orchestrator.process_account(account))
        .buffered(config.concurrency)
        .collect()
        .await;

    persist(&mut store, &store_path, &reports);

    let summary = RunSummary { reports };
    let text = summary.render(primary, secondary);
    info!("run complete:\n{}", text);

    if let Some(telegram) = config.telegram.clone() {
        match Notifier::new(telegram) {
            Ok(notifier) => notifier.send_summary(&text).await,
            Err(e) => warn!("notifier unavailable: {}", e),
        }
    }

    Ok(summary)
}

/// Write refreshed sessions to the store file and, when running under
/// QingLong, back into its environment file.
fn persist(store: &mut CredentialStore, store_path: &std::path::Path, reports: &[AccountReport]) {
    let mut last_refreshed_primary: Option<&SessionToken> = None;
    let mut last_refreshed_secondary: Option<&SessionToken> = None;

    for report in reports {
        // primary_token is None when the account ended with no usable
        // session; the store keeps whatever it already had in that case.
        if let Some(token) = report.primary_token.as_ref() {
            store.record_primary(&report.identifier, token.as_str());
        }
        if let Some(token) = report.refreshed_primary.as_ref() {
            last_refreshed_primary = Some(token);
        }
        if let Some(token) = report.refreshed_secondary.as_ref() {
            store.record_secondary(&report.identifier, token.as_str());
            last_refreshed_secondary = Some(token);
        }
    }

    if let Err(e) = store.save(store_path) {
        error!("failed to persist credential store: {}", e);
    }

    if let Some(token) = last_refreshed_primary {
        qinglong::update_env("NODESEEK_COOKIE", token.as_str());
    }
    if let Some(token) = last_refreshed_secondary {
        qinglong::update_env("DEEPFLOOD_COOKIE", token.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config_with(cookies: &[&str], accounts: &[&str]) -> Config {
        let cookie_var = cookies.join("&");
        let account_var = accounts.join("&");
        Config::from_lookup(move |key| match key {
            "NODESEEK_COOKIE" if !cookie_var.is_empty() => Some(cookie_var.clone()),
            "NODESEEK_ACCOUNT" if !account_var.is_empty() => Some(account_var.clone()),
            _ => None,
        })
    }

    #[test]
    fn cookies_pair_with_credentials_by_position() {
        let config = config_with(&["smac=a", "smac=b", "smac=c"], &["alice:pw"]);
        let accounts = build_accounts(&config, &CredentialStore::default());

        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0].identifier, "alice");
        assert_eq!(accounts[0].token.as_ref().unwrap().as_str(), "smac=a");
        assert!(accounts[0].credential.is_some());

        assert_eq!(accounts[1].identifier, "cookie-2");
        assert_eq!(accounts[1].token.as_ref().unwrap().as_str(), "smac=b");
        assert!(accounts[1].credential.is_none());
        assert_eq!(accounts[2].identifier, "cookie-3");
    }

    #[test]
    fn stored_session_fills_missing_cookie() {
        let config = config_with(&[], &["alice:pw"]);
        let mut store = CredentialStore::default();
        store.record_primary("alice", "smac=persisted");

        let accounts = build_accounts(&config, &store);
        assert_eq!(accounts[0].token.as_ref().unwrap().as_str(), "smac=persisted");
    }

    #[test]
    fn no_configuration_means_no_accounts() {
        let config = config_with(&[], &[]);
        assert!(build_accounts(&config, &CredentialStore::default()).is_empty());
    }

    #[test]
    fn explicit_deepflood_cookie_beats_store() {
        let mut store = CredentialStore::default();
        store.record_secondary("alice", "session=old");

        let config = Config::from_lookup(|key| match key {
            "NODESEEK_ACCOUNT" => Some("alice:pw".into()),
            "DEEPFLOOD_COOKIE" => Some("session=explicit".into()),
            _ => None,
        });
        let accounts = build_accounts(&config, &store);
        assert_eq!(
            accounts[0].secondary_token.as_ref().unwrap().as_str(),
            "session=explicit"
        );
    }
}
