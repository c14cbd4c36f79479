//! YesCaptcha API models

use serde::{Deserialize, Serialize};

/// Successful solve
#[derive(Debug, Clone)]
pub struct CaptchaResult {
    pub token: String,
    pub solve_time_ms: u64,
}

/// Create task request
#[derive(Debug, Serialize)]
pub struct CreateTaskRequest {
    #[serde(rename = "clientKey")]
    pub client_key: String,
    pub task: SolverTask,
}

/// Task types we submit
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum SolverTask {
    #[serde(rename = "TurnstileTaskProxyless")]
    TurnstileProxyless {
        #[serde(rename = "websiteURL")]
        website_url: String,
        #[serde(rename = "websiteKey")]
        website_key: String,
    },
}

/// Create task response
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CreateTaskResponse {
    #[serde(rename = "errorId")]
    pub error_id: i32,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(rename = "errorDescription")]
    pub error_description: Option<String>,
    #[serde(rename = "taskId")]
    pub task_id: Option<serde_json::Value>,
}

impl CreateTaskResponse {
    /// Task IDs come back as either a number or a string depending on the
    /// service revision.
    pub fn task_id_string(&self) -> Option<String> {
        match self.task_id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Get result request
#[derive(Debug, Serialize)]
pub struct GetResultRequest {
    #[serde(rename = "clientKey")]
    pub client_key: String,
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// Get result response
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct GetResultResponse {
    #[serde(rename = "errorId")]
    pub error_id: i32,
    #[serde(rename = "errorDescription")]
    pub error_description: Option<String>,
    pub status: Option<String>,
    pub solution: Option<TaskSolution>,
}

impl GetResultResponse {
    pub fn is_ready(&self) -> bool {
        self.status.as_deref() == Some("ready")
    }

    pub fn token(&self) -> Option<&str> {
        self.solution
            .as_ref()
            .and_then(|s| s.token.as_deref().or(s.g_recaptcha_response.as_deref()))
    }
}

/// Solution payload
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct TaskSolution {
    pub token: Option<String>,
    #[serde(rename = "gRecaptchaResponse")]
    pub g_recaptcha_response: Option<String>,
}

/// CAPTCHA error types
#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("API key not configured")]
    ApiKeyMissing,

    #[error("task creation failed: {0}")]
    TaskCreationFailed(String),

    #[error("solve timed out after {0} polling attempts")]
    Timeout(u32),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
