use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Non-success HTTP status from the service. Never retried.
    #[error("{description}\n{message}")]
    Http {
        code: u16,
        description: String,
        message: String,
    },

    #[error("Unknown geometry type {0}: only Point and Polygon are supported")]
    UnsupportedGeometry(String),

    #[error("geometry file contains no features")]
    EmptyGeometry,

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid date `{input}`: expected YYYY-MM-DD")]
    DateFormat { input: String },

    #[error("No tasks found")]
    NoTasksFound,

    #[error("No tasks found with status {status} : try processing|done|pending")]
    NoMatchingTask { status: String },

    #[error("Task {task_id} has not completed processing. Skipping download")]
    TaskNotComplete { task_id: String },

    #[error("Task {task_id} ended with status {status}. Nothing to download")]
    TaskFailed { task_id: String, status: String },

    #[error("unexpected status response: {0}")]
    UnexpectedStatus(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("gave up waiting after {0:?}")]
    TimedOut(Duration),

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Informational outcomes that end a command without failing it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NoTasksFound | Error::TaskNotComplete { .. })
    }
}

// The service answers errors with {"message": ...}; some gateways send plain text.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
}

/// Fixed sentence for each status the service documents.
pub fn describe_status(code: u16) -> Option<&'static str> {
    let text = match code {
        400 => "Bad Request - The request could not be understood by the server due to malformed syntax.",
        401 => "Unauthorized - Your API key is wrong.",
        403 => "Forbidden - The api endpoint requested is only for elevated users.",
        404 => "Not Found - The specified endpoint / resource could not be found.",
        405 => "Method Not Allowed - You tried to access a endpoint / resource with an invalid method.",
        429 => "Too Many Requests - The amount of requests being sent cannot be handled. Please slow the rate of your requests.",
        500 => "Internal Server Error - We had a problem with our server. Please try again later.",
        503 => "Service Unavailable - We're temporarily offline for maintenance. Please try again later.",
        _ => return None,
    };
    Some(text)
}

pub(crate) fn http_error(status: StatusCode, url: &str, body: &str) -> Error {
    let code = status.as_u16();
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());

    let description = match describe_status(code) {
        Some(text) => text.to_string(),
        None => format!("API request failed: HTTP {} for url ({})", status, url),
    };

    Error::Http {
        code,
        description,
        message,
    }
}
