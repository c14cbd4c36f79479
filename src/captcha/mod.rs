//! CAPTCHA solving module
//!
//! Resolves the Turnstile challenge gating the sign-in API via the
//! YesCaptcha task service (create task, then bounded polling).

mod solver;
mod types;

pub use solver::CaptchaSolver;
pub use types::*;
