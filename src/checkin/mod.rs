//! Site action client
//!
//! Issues the check-in call with client-fingerprint rotation and classifies
//! the response into the closed outcome set.

mod client;
mod fingerprint;
mod outcome;

pub use client::{CheckinClient, CheckinReport};
pub use fingerprint::FingerprintProfile;
pub use outcome::{classify, CheckinResponse, Outcome};
