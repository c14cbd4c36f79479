//! Headless-browser login
//!
//! Capability-complete fallback for accounts without a remote solver key:
//! drives Chrome through the sign-in page end to end, including the
//! Turnstile widget, and harvests the session cookies the page actually set.
//! Every exit path tears the browser down.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{LoginError, LoginStrategy};
use crate::captcha::CaptchaError;
use crate::session::SessionToken;
use crate::site::Site;

/// Grace period for an anti-bot interstitial before the real page loads
const INTERSTITIAL_GRACE: Duration = Duration::from_secs(8);
/// Settle delay after clicking submit, before the URL check
const SUBMIT_SETTLE: Duration = Duration::from_secs(5);
/// Widget appearance probe: 10 x 500ms
const WIDGET_POLL_ATTEMPTS: u32 = 10;
const WIDGET_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Verification token probe: 30 x 1s
const TOKEN_POLL_ATTEMPTS: u32 = 30;
const TOKEN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// A populated cf-turnstile-response is far longer than this
const TOKEN_MIN_LEN: usize = 10;

/// Accepted markup variants for the login form
const USERNAME_SELECTORS: &[&str] = &[
    "input#stacked-email",
    "input[name='username']",
    "input[type='text']",
];
const PASSWORD_SELECTORS: &[&str] = &[
    "input#stacked-password",
    "input[name='password']",
    "input[type='password']",
];
const SUBMIT_SELECTORS: &[&str] = &["button[type='submit']", "form button"];

/// Probe result; always a full object because a bare JS `null` does not
/// survive the CDP evaluation round-trip.
#[derive(Debug, Deserialize)]
struct WidgetProbe {
    found: bool,
    x: f64,
    y: f64,
    height: f64,
}

/// Browser-automation login strategy
pub struct BrowserLogin {
    headless: bool,
    chrome_path: Option<String>,
    timeout: Duration,
}

impl BrowserLogin {
    pub fn new(headless: bool, chrome_path: Option<String>) -> Self {
        Self {
            headless,
            chrome_path,
            timeout: Duration::from_secs(180),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig, LoginError> {
        let data_dir = std::env::temp_dir()
            .join("nodeseek-checkin")
            .join(format!("profile-{}", rand::random::<u32>()));
        let _ = std::fs::create_dir_all(&data_dir);

        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .user_data_dir(&data_dir)
            // undetected-chromedriver style countermeasures
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--exclude-switches=enable-automation")
            .arg("--disable-infobars")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox");

        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(LoginError::Browser)
    }

    async fn run_login(
        &self,
        browser: &Browser,
        site: &Site,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, LoginError> {
        let signin_page = site.signin_page_url();
        let page = browser
            .new_page(signin_page.as_str())
            .await
            .map_err(|e| LoginError::Browser(e.to_string()))?;

        // Let any holding page resolve itself
        tokio::time::sleep(INTERSTITIAL_GRACE).await;

        fill_first_match(&page, USERNAME_SELECTORS, username).await?;
        fill_first_match(&page, PASSWORD_SELECTORS, password).await?;

        // Challenge first; submit only if it did not fail
        solve_turnstile_in_page(&page).await?;

        click_first_match(&page, SUBMIT_SELECTORS).await?;
        tokio::time::sleep(SUBMIT_SETTLE).await;

        let url = page
            .url()
            .await
            .map_err(|e| LoginError::Browser(e.to_string()))?
            .unwrap_or_default();
        if url.contains("signIn") {
            return Err(LoginError::Rejected("still on the sign-in page".into()));
        }

        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| LoginError::Browser(e.to_string()))?;
        info!("[{}] browser login landed on {} ({} cookies)", site.name, url, cookies.len());

        SessionToken::from_cookie_pairs(cookies.iter().map(|c| (&c.name, &c.value)))
            .ok_or(LoginError::NoCookies)
    }
}

impl LoginStrategy for BrowserLogin {
    async fn login(
        &self,
        site: &Site,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, LoginError> {
        info!("[{}] launching browser for {} (headless: {})", site.name, username, self.headless);
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| LoginError::Browser(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = tokio::time::timeout(
            self.timeout,
            self.run_login(&browser, site, username, password),
        )
        .await;

        // Unconditional teardown on every exit path
        let _ = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();

        match result {
            Ok(inner) => inner,
            Err(_) => Err(LoginError::Browser(format!(
                "login exceeded {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Fill the first input matching any of the accepted selectors.
async fn fill_first_match(page: &Page, selectors: &[&str], text: &str) -> Result<(), LoginError> {
    for selector in selectors {
        if let Ok(element) = page.find_element(*selector).await {
            element
                .click()
                .await
                .map_err(|e| LoginError::Browser(e.to_string()))?
                .type_str(text)
                .await
                .map_err(|e| LoginError::Browser(e.to_string()))?;
            return Ok(());
        }
    }
    Err(LoginError::Browser(format!(
        "no element matched any of {:?}",
        selectors
    )))
}

async fn click_first_match(page: &Page, selectors: &[&str]) -> Result<(), LoginError> {
    for selector in selectors {
        if let Ok(element) = page.find_element(*selector).await {
            element
                .click()
                .await
                .map_err(|e| LoginError::Browser(e.to_string()))?;
            return Ok(());
        }
    }
    Err(LoginError::Browser(format!(
        "no element matched any of {:?}",
        selectors
    )))
}

/// Local Turnstile interaction on an already-open page.
///
/// No widget within the probe window means the page is already clear, which
/// is a valid terminal state. Otherwise click the checkbox region and wait
/// for the hidden response field to fill in.
async fn solve_turnstile_in_page(page: &Page) -> Result<(), LoginError> {
    let mut probe = widget_rect(page).await?;
    for _ in 1..WIDGET_POLL_ATTEMPTS {
        if probe.found {
            break;
        }
        tokio::time::sleep(WIDGET_POLL_INTERVAL).await;
        probe = widget_rect(page).await?;
    }

    if !probe.found {
        debug!("no Turnstile widget appeared; page already clear");
        return Ok(());
    }
    let rect = probe;

    // The clickable checkbox sits near the left edge of the widget, not at
    // its center: a fixed inset hits it across widget sizes.
    let x = rect.x + 25.0;
    let y = rect.y + rect.height / 2.0;
    debug!("clicking Turnstile widget at ({:.0}, {:.0})", x, y);
    dispatch_click(page, x, y).await?;

    for attempt in 1..=TOKEN_POLL_ATTEMPTS {
        tokio::time::sleep(TOKEN_POLL_INTERVAL).await;
        if token_field_len(page).await? > TOKEN_MIN_LEN {
            info!("Turnstile verified after {}s", attempt);
            return Ok(());
        }
    }

    warn!("Turnstile verification token never appeared");
    Err(LoginError::Challenge(CaptchaError::Timeout(
        TOKEN_POLL_ATTEMPTS,
    )))
}

/// Bounding box of the Turnstile widget in the rendered DOM, if present.
async fn widget_rect(page: &Page) -> Result<WidgetProbe, LoginError> {
    let js = r#"
        (() => {
            const miss = { found: false, x: 0, y: 0, height: 0 };
            const el = document.querySelector('.cf-turnstile')
                || document.querySelector("iframe[src*='challenges.cloudflare.com']");
            if (!el) return miss;
            const r = el.getBoundingClientRect();
            if (r.width === 0 || r.height === 0) return miss;
            return { found: true, x: r.x, y: r.y, height: r.height };
        })()
    "#;
    page.evaluate(js)
        .await
        .map_err(|e| LoginError::Browser(e.to_string()))?
        .into_value()
        .map_err(|e| LoginError::Browser(e.to_string()))
}

async fn token_field_len(page: &Page) -> Result<usize, LoginError> {
    let js = r#"
        (() => {
            const el = document.querySelector("input[name='cf-turnstile-response']");
            return el ? el.value.length : 0;
        })()
    "#;
    page.evaluate(js)
        .await
        .map_err(|e| LoginError::Browser(e.to_string()))?
        .into_value()
        .map_err(|e| LoginError::Browser(e.to_string()))
}

/// Press-and-release through the CDP input channel; synthetic DOM events
/// don't reach the widget's iframe.
async fn dispatch_click(page: &Page, x: f64, y: f64) -> Result<(), LoginError> {
    let press = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MousePressed)
        .x(x)
        .y(y)
        .button(MouseButton::Left)
        .click_count(1)
        .build()
        .map_err(LoginError::Browser)?;
    page.execute(press)
        .await
        .map_err(|e| LoginError::Browser(e.to_string()))?;

    let release = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseReleased)
        .x(x)
        .y(y)
        .button(MouseButton::Left)
        .click_count(1)
        .build()
        .map_err(LoginError::Browser)?;
    page.execute(release)
        .await
        .map_err(|e| LoginError::Browser(e.to_string()))?;

    Ok(())
}
