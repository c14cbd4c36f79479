//! Client fingerprint profiles
//!
//! The sites fingerprint HTTP clients and reject some signatures with
//! challenge-marked 403s. Each profile is a coherent browser header
//! signature; the action client walks the list in order until one is
//! accepted. Safari profiles carry no client-hint headers on purpose —
//! Safari does not send them.

use reqwest::RequestBuilder;

/// One browser signature the action client can present
#[derive(Debug, Clone, Copy)]
pub struct FingerprintProfile {
    pub name: &'static str,
    pub user_agent: &'static str,
    /// `sec-ch-ua` value; None for browsers that don't send client hints
    pub sec_ch_ua: Option<&'static str>,
    pub sec_ch_ua_platform: Option<&'static str>,
    pub accept_language: &'static str,
}

impl FingerprintProfile {
    /// Ordered rotation list. Safari first: it has historically been the
    /// signature the sites accept most reliably.
    pub fn rotation() -> &'static [FingerprintProfile] {
        &ROTATION
    }

    /// Stamp this profile's headers onto a request
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        let mut request = request
            .header("User-Agent", self.user_agent)
            .header("Accept-Language", self.accept_language);
        if let Some(ua) = self.sec_ch_ua {
            request = request
                .header("sec-ch-ua", ua)
                .header("sec-ch-ua-mobile", "?0");
        }
        if let Some(platform) = self.sec_ch_ua_platform {
            request = request.header("sec-ch-ua-platform", platform);
        }
        request
    }
}

static ROTATION: [FingerprintProfile; 4] = [
    FingerprintProfile {
        name: "safari15_5",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.5 Safari/605.1.15",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        accept_language: "zh-CN,zh;q=0.9,en;q=0.8",
    },
    FingerprintProfile {
        name: "safari15_3",
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.3 Safari/605.1.15",
        sec_ch_ua: None,
        sec_ch_ua_platform: None,
        accept_language: "zh-CN,zh;q=0.9,en;q=0.8",
    },
    FingerprintProfile {
        name: "chrome120",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\""),
        sec_ch_ua_platform: Some("\"Windows\""),
        accept_language: "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7",
    },
    FingerprintProfile {
        name: "chrome119",
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        sec_ch_ua: Some("\"Google Chrome\";v=\"119\", \"Chromium\";v=\"119\", \"Not?A_Brand\";v=\"24\""),
        sec_ch_ua_platform: Some("\"Windows\""),
        accept_language: "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7",
    },
];
