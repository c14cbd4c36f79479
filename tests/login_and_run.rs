//! API login against mock solver and site endpoints, plus full coordinator
//! runs with a temporary credential store.

use std::collections::HashMap;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nodeseek_checkin::auth::{ApiLogin, LoginError, LoginStrategy};
use nodeseek_checkin::captcha::CaptchaSolver;
use nodeseek_checkin::checkin::Outcome;
use nodeseek_checkin::config::Config;
use nodeseek_checkin::runner;
use nodeseek_checkin::site::Site;
use nodeseek_checkin::store::CredentialStore;

/// Solver mock that answers createTask and comes back ready on first poll.
async fn mount_solver(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/createTask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errorId": 0,
            "taskId": 900011
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/getTaskResult"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errorId": 0,
            "status": "ready",
            "solution": { "token": token }
        })))
        .mount(server)
        .await;
}

fn fast_solver(base: &str) -> CaptchaSolver {
    CaptchaSolver::new("test-key")
        .unwrap()
        .with_api_base(base)
        .with_poll_interval(Duration::from_millis(10))
        .with_poll_attempts(3)
}

#[tokio::test]
async fn api_login_mints_session_from_signin_cookies() {
    let solver_server = MockServer::start().await;
    mount_solver(&solver_server, "turnstile-tok").await;

    let site_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signIn.html"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "smac=fresh123; Path=/"),
        )
        .expect(1)
        .mount(&site_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/account/signIn"))
        .and(body_partial_json(serde_json::json!({
            "username": "alice",
            "password": "secret",
            "token": "turnstile-tok",
            "source": "turnstile"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "登录成功"
        })))
        .expect(1)
        .mount(&site_server)
        .await;

    let site = Site::named("NodeSeek", &site_server.uri());
    let login = ApiLogin::new(fast_solver(&solver_server.uri()));
    let token = login.login(&site, "alice", "secret").await.unwrap();

    assert!(token.as_str().contains("smac=fresh123"));
}

#[tokio::test]
async fn api_login_surfaces_rejection_message() {
    let solver_server = MockServer::start().await;
    mount_solver(&solver_server, "turnstile-tok").await;

    let site_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/signIn.html"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&site_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/account/signIn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "用户名或密码错误"
        })))
        .mount(&site_server)
        .await;

    let site = Site::named("NodeSeek", &site_server.uri());
    let login = ApiLogin::new(fast_solver(&solver_server.uri()));
    let err = login.login(&site, "alice", "wrong").await.unwrap_err();

    match err {
        LoginError::Rejected(message) => assert!(message.contains("密码错误")),
        other => panic!("expected rejection, got {other}"),
    }
}

#[tokio::test]
async fn solver_poll_exhaustion_is_a_challenge_error() {
    let solver_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/createTask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errorId": 0,
            "taskId": "t-1"
        })))
        .mount(&solver_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/getTaskResult"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errorId": 0,
            "status": "processing"
        })))
        .expect(3)
        .mount(&solver_server)
        .await;

    let site_server = MockServer::start().await;
    let site = Site::named("NodeSeek", &site_server.uri());
    let login = ApiLogin::new(fast_solver(&solver_server.uri()));
    let err = login.login(&site, "alice", "secret").await.unwrap_err();

    assert!(err.is_challenge());
}

fn config_from(vars: Vec<(&str, String)>) -> Config {
    let map: HashMap<String, String> =
        vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    Config::from_lookup(move |key| map.get(key).cloned())
}

fn attendance_success(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(serde_json::json!({ "success": true, "message": message }))
}

#[tokio::test]
async fn run_with_valid_cookie_persists_it_unchanged() {
    let primary_server = MockServer::start().await;
    let secondary_server = MockServer::start().await;
    // First run earns the reward; the second run of the day is already done.
    Mock::given(method("POST"))
        .and(path("/api/attendance"))
        .respond_with(attendance_success("签到收益5个鸡腿"))
        .up_to_n_times(1)
        .mount(&primary_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/attendance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "今天已完成签到"
        })))
        .mount(&primary_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/attendance"))
        .respond_with(attendance_success("签到收益2个鸡腿"))
        .mount(&secondary_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sessions.json");
    let config = config_from(vec![
        ("NODESEEK_COOKIE", "smac=ok".to_string()),
        ("CHECKIN_STORE_PATH", store_path.display().to_string()),
    ]);

    let primary = Site::named("NodeSeek", &primary_server.uri());
    let secondary = Site::named("DeepFlood", &secondary_server.uri());
    let summary = runner::run_against(&config, &primary, &secondary).await.unwrap();

    assert!(!summary.all_failed());
    assert_eq!(summary.checked_in_count("NodeSeek"), 1);
    assert_eq!(summary.checked_in_count("DeepFlood"), 1);

    let text = summary.render(&primary, &secondary);
    assert!(text.starts_with("签到完成"));
    assert!(text.contains("NodeSeek: ✓ 1/1"));

    let store = CredentialStore::load(&store_path);
    assert_eq!(store.primary_token("cookie-1"), Some("smac=ok"));

    // Run again: already-done counts as covered and the stored token is
    // untouched.
    let summary = runner::run_against(&config, &primary, &secondary).await.unwrap();
    assert!(!summary.all_failed());
    assert_eq!(summary.reports[0].results[0].outcome, Outcome::AlreadyDone);
    let store = CredentialStore::load(&store_path);
    assert_eq!(store.primary_token("cookie-1"), Some("smac=ok"));
}

#[tokio::test]
async fn run_refreshes_expired_session_through_api_login() {
    let solver_server = MockServer::start().await;
    mount_solver(&solver_server, "turnstile-tok").await;

    let primary_server = MockServer::start().await;
    let secondary_server = MockServer::start().await;

    // The cached cookie is rejected, the freshly minted one lands on the
    // already-done branch (the morning cron may have beaten us to it).
    Mock::given(method("POST"))
        .and(path("/api/attendance"))
        .and(header("Cookie", "smac=old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": 404,
            "message": "USER NOT FOUND"
        })))
        .expect(1)
        .mount(&primary_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/attendance"))
        .and(header("Cookie", "smac=fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "今天已完成签到"
        })))
        .expect(1)
        .mount(&primary_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/signIn.html"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "smac=fresh; Path=/"))
        .mount(&primary_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/account/signIn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true
        })))
        .mount(&primary_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/attendance"))
        .respond_with(attendance_success("签到收益2个鸡腿"))
        .mount(&secondary_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sessions.json");
    let config = config_from(vec![
        ("NODESEEK_COOKIE", "smac=old".to_string()),
        ("NODESEEK_ACCOUNT", "alice:secret".to_string()),
        ("YESCAPTCHA_KEY", "test-key".to_string()),
        ("YESCAPTCHA_API_BASE", solver_server.uri()),
        ("CHECKIN_STORE_PATH", store_path.display().to_string()),
    ]);

    let primary = Site::named("NodeSeek", &primary_server.uri());
    let secondary = Site::named("DeepFlood", &secondary_server.uri());
    let summary = runner::run_against(&config, &primary, &secondary).await.unwrap();

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].identifier, "alice");
    assert_eq!(summary.reports[0].results[0].outcome, Outcome::AlreadyDone);

    // The refreshed session is what gets persisted for the next run.
    let store = CredentialStore::load(&store_path);
    assert_eq!(store.primary_token("alice"), Some("smac=fresh"));
}

#[tokio::test]
async fn run_without_any_accounts_is_an_empty_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("sessions.json");
    let config = config_from(vec![(
        "CHECKIN_STORE_PATH",
        store_path.display().to_string(),
    )]);

    let primary = Site::named("NodeSeek", "http://127.0.0.1:1");
    let secondary = Site::named("DeepFlood", "http://127.0.0.1:1");
    let summary = runner::run_against(&config, &primary, &secondary).await.unwrap();

    assert!(summary.reports.is_empty());
    assert!(summary.all_failed());
}
