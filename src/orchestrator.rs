//! Account orchestrator
//!
//! Per-account state machine: try the cached session, decide from the
//! classified outcome whether re-authentication is warranted, drive one
//! login strategy, then retry the action exactly once with the fresh token.
//! The secondary site runs the same shape with federation as its strategy.

use tracing::{info, warn};

use crate::auth::LoginStrategy;
use crate::checkin::{CheckinClient, CheckinReport, Outcome};
use crate::config::PasswordCredential;
use crate::federation::FederationClient;
use crate::session::SessionToken;
use crate::site::Site;

/// One account's merged credentials for a run
#[derive(Debug, Clone)]
pub struct Account {
    pub identifier: String,
    /// Cached primary-site session
    pub token: Option<SessionToken>,
    /// Password credential, when re-authentication is possible
    pub credential: Option<PasswordCredential>,
    /// Explicitly supplied secondary-site session
    pub secondary_token: Option<SessionToken>,
}

/// Outcome of one (account, site) pair
#[derive(Debug, Clone)]
pub struct SiteResult {
    pub site: &'static str,
    pub outcome: Outcome,
    pub message: String,
}

impl SiteResult {
    fn new(site: &Site, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            site: site.name,
            outcome,
            message: message.into(),
        }
    }
}

/// Everything a run records for one account
#[derive(Debug)]
pub struct AccountReport {
    pub identifier: String,
    pub results: Vec<SiteResult>,
    /// Best-known primary token at end of run (None when the cached token
    /// was proven invalid and no replacement could be minted)
    pub primary_token: Option<SessionToken>,
    /// Freshly minted primary token, set only when re-authentication ran
    pub refreshed_primary: Option<SessionToken>,
    /// Freshly federated secondary token to persist
    pub refreshed_secondary: Option<SessionToken>,
}

/// Drives the check-in lifecycle for single accounts.
pub struct Orchestrator<'a, S: LoginStrategy> {
    checkin: &'a CheckinClient,
    federation: &'a FederationClient,
    strategy: Option<&'a S>,
    primary: &'a Site,
    secondary: &'a Site,
    randomize: bool,
}

impl<'a, S: LoginStrategy> Orchestrator<'a, S> {
    pub fn new(
        checkin: &'a CheckinClient,
        federation: &'a FederationClient,
        strategy: Option<&'a S>,
        primary: &'a Site,
        secondary: &'a Site,
        randomize: bool,
    ) -> Self {
        Self {
            checkin,
            federation,
            strategy,
            primary,
            secondary,
            randomize,
        }
    }

    /// Run both sites for one account. Always yields exactly one result per
    /// site; never panics the run.
    pub async fn process_account(&self, account: &Account) -> AccountReport {
        info!("[{}] processing account", account.identifier);

        let (primary_result, active_token, refreshed_primary) = self.run_primary(account).await;
        let (secondary_result, refreshed_secondary) =
            self.run_secondary(account, active_token.as_ref()).await;

        AccountReport {
            identifier: account.identifier.clone(),
            results: vec![primary_result, secondary_result],
            primary_token: active_token,
            refreshed_primary,
            refreshed_secondary,
        }
    }

    /// Primary-site state machine.
    ///
    /// Returns the terminal result, the token that ended up active (cached
    /// or freshly minted), and the fresh token if one was minted.
    async fn run_primary(
        &self,
        account: &Account,
    ) -> (SiteResult, Option<SessionToken>, Option<SessionToken>) {
        let id = &account.identifier;

        // No cached session: authenticate up front, then act once. Without
        // a password either there is no way forward at all.
        let Some(cached) = account.token.clone() else {
            let Some(credential) = account.credential.as_ref() else {
                return (
                    SiteResult::new(self.primary, Outcome::NoCredential, "无有效凭证"),
                    None,
                    None,
                );
            };
            match self.reauthenticate(id, credential).await {
                Ok(minted) => {
                    let report = self.attempt(self.primary, &minted).await;
                    return (
                        SiteResult::new(self.primary, report.outcome, report.message),
                        Some(minted.clone()),
                        Some(minted),
                    );
                }
                Err(result) => return (result, None, None),
            }
        };

        // try-cached-session
        let report = self.attempt(self.primary, &cached).await;
        match report.outcome {
            Outcome::Success | Outcome::AlreadyDone => (
                SiteResult::new(self.primary, report.outcome, report.message),
                Some(cached),
                None,
            ),
            // A non-credential failure does not imply a bad session.
            Outcome::TransientFailure => (
                SiteResult::new(self.primary, report.outcome, report.message),
                Some(cached),
                None,
            ),
            Outcome::InvalidCredential => {
                warn!("[{}] cached session rejected by {}", id, self.primary.name);
                let Some(credential) = account.credential.as_ref() else {
                    // Cannot refresh a token with no way to mint a new one.
                    return (
                        SiteResult::new(self.primary, Outcome::NoCredential, "Cookie 已失效且无账号密码"),
                        None,
                        None,
                    );
                };
                match self.reauthenticate(id, credential).await {
                    Ok(minted) => {
                        // Exactly one retry; its outcome is terminal.
                        let retry = self.attempt(self.primary, &minted).await;
                        (
                            SiteResult::new(self.primary, retry.outcome, retry.message),
                            Some(minted.clone()),
                            Some(minted),
                        )
                    }
                    Err(result) => (result, None, None),
                }
            }
            // attempt() only produces the four action outcomes above
            _ => (
                SiteResult::new(self.primary, report.outcome, report.message),
                Some(cached),
                None,
            ),
        }
    }

    /// Secondary-site flow: explicit token first, then the primary token
    /// directly, and federation only once that attempt is invalidated.
    async fn run_secondary(
        &self,
        account: &Account,
        primary_token: Option<&SessionToken>,
    ) -> (SiteResult, Option<SessionToken>) {
        let id = &account.identifier;

        let (candidate, via_primary) = match (&account.secondary_token, primary_token) {
            (Some(explicit), _) => (explicit.clone(), false),
            (None, Some(primary)) => (primary.clone(), true),
            (None, None) => {
                return (
                    SiteResult::new(self.secondary, Outcome::NoCredential, "无有效凭证"),
                    None,
                )
            }
        };

        if via_primary {
            info!("[{}] trying primary session directly on {}", id, self.secondary.name);
        }

        let report = self.attempt(self.secondary, &candidate).await;
        if report.outcome != Outcome::InvalidCredential {
            return (
                SiteResult::new(self.secondary, report.outcome, report.message),
                None,
            );
        }

        // Invalidated: federation is the only way to mint a secondary session.
        let Some(primary) = primary_token else {
            return (
                SiteResult::new(self.secondary, Outcome::InvalidCredential, report.message),
                None,
            );
        };

        match self.federation.federate(self.primary, self.secondary, primary).await {
            Ok(federated) => {
                let retry = self.attempt(self.secondary, &federated).await;
                (
                    SiteResult::new(self.secondary, retry.outcome, retry.message),
                    Some(federated),
                )
            }
            Err(e) => {
                if e.is_rate_limited() {
                    warn!("[{}] federation unavailable until the quota resets: {}", id, e);
                } else {
                    warn!("[{}] federation failed: {}", id, e);
                }
                (
                    SiteResult::new(self.secondary, Outcome::LoginFailed, e.to_string()),
                    None,
                )
            }
        }
    }

    async fn attempt(&self, site: &Site, token: &SessionToken) -> CheckinReport {
        self.checkin.perform_checkin(token, site, self.randomize).await
    }

    /// One strategy invocation; failures map onto the outcome taxonomy.
    async fn reauthenticate(
        &self,
        identifier: &str,
        credential: &PasswordCredential,
    ) -> Result<SessionToken, SiteResult> {
        let Some(strategy) = self.strategy else {
            return Err(SiteResult::new(
                self.primary,
                Outcome::LoginFailed,
                "no login strategy configured",
            ));
        };

        info!("[{}] re-authenticating via password login", identifier);
        match strategy
            .login(self.primary, &credential.username, &credential.password)
            .await
        {
            Ok(token) => {
                info!("[{}] login succeeded, session refreshed", identifier);
                Ok(token)
            }
            Err(e) => {
                let outcome = if e.is_challenge() {
                    Outcome::ChallengeFailed
                } else {
                    Outcome::LoginFailed
                };
                warn!("[{}] re-authentication failed: {}", identifier, e);
                Err(SiteResult::new(self.primary, outcome, e.to_string()))
            }
        }
    }
}
