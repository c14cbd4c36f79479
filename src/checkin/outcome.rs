//! Outcome taxonomy and response classification
//!
//! The sites answer the attendance POST with a uniform JSON shape whose
//! meaning is spread across a success flag, free-text message phrases and a
//! domain status code. Classification is an ordered rule table so it can be
//! tested on fixture responses without any HTTP involved.

use serde::Deserialize;

/// Terminal result tags, one per (account, site) per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Check-in accepted, reward granted
    Success,
    /// Check-in was already performed today
    AlreadyDone,
    /// The session token was rejected as unknown/expired
    InvalidCredential,
    /// Transport error, anti-bot block, or unrecognized response
    TransientFailure,
    /// No token and no way to mint one
    NoCredential,
    /// Re-authentication failed at the challenge step
    ChallengeFailed,
    /// Re-authentication failed after the challenge step
    LoginFailed,
}

impl Outcome {
    /// Stable tag used in the summary output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AlreadyDone => "already-done",
            Self::InvalidCredential => "invalid-credential",
            Self::TransientFailure => "transient-failure",
            Self::NoCredential => "no-credential",
            Self::ChallengeFailed => "challenge-failed",
            Self::LoginFailed => "login-failed",
        }
    }

    /// True for the two states that mean the day's check-in is covered
    pub fn is_checked_in(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyDone)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed attendance response body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckinResponse {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub status: Option<i64>,
}

impl CheckinResponse {
    fn message_contains(&self, phrase: &str) -> bool {
        self.message.as_deref().is_some_and(|m| m.contains(phrase))
    }
}

/// One entry of the ordered classification table
pub struct ClassifyRule {
    pub name: &'static str,
    pub matches: fn(&CheckinResponse) -> bool,
    pub outcome: Outcome,
}

/// Ordered classification table for the attendance response. First match
/// wins; an unmatched response is a transient failure.
pub static CLASSIFY_RULES: &[ClassifyRule] = &[
    ClassifyRule {
        // "鸡腿" is the reward unit in the success message
        name: "reward-phrase-or-success-flag",
        matches: |r| r.message_contains("鸡腿") || r.success == Some(true),
        outcome: Outcome::Success,
    },
    ClassifyRule {
        name: "already-done-phrase",
        matches: |r| r.message_contains("已完成签到"),
        outcome: Outcome::AlreadyDone,
    },
    ClassifyRule {
        // The sites report an expired/unknown session as status 404 in the body
        name: "invalid-session-status",
        matches: |r| r.status == Some(404),
        outcome: Outcome::InvalidCredential,
    },
];

/// Classify a parsed attendance response.
pub fn classify(response: &CheckinResponse) -> (Outcome, String) {
    let message = response.message.clone().unwrap_or_default();
    for rule in CLASSIFY_RULES {
        if (rule.matches)(response) {
            return (rule.outcome, message);
        }
    }
    (Outcome::TransientFailure, message)
}
