//! Error types shared by the service clients and the pipeline stages.
//!
//! Every external call returns [`ServiceError`]. The only classification the
//! pipeline cares about is [`ServiceError::is_timeout`], which decides whether
//! topic generation retries or gives up.

use thiserror::Error;

/// Failure talking to one of the external services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("{service} returned status {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} returned an empty response")]
    Empty(&'static str),

    #[error("{0} is not configured (missing credentials)")]
    NotConfigured(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// True for failures worth waiting out and retrying.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::Timeout(_))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout(e.to_string())
        } else {
            ServiceError::Http(e)
        }
    }
}

/// Turn a non-2xx response into [`ServiceError::Api`], passing successes through.
pub async fn check_status(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Failure loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
