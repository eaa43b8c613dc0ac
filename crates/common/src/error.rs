use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("Exchange rejected credentials: {0}")]
    Auth(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decimal error: {0}")]
    Decimal(#[from] rust_decimal::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gave up after {failures} consecutive failed cycles, last error: {last}")]
    FailureBudgetExhausted { failures: u32, last: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Errors that retrying cannot fix. The cycle driver stops on these
    /// instead of backing off.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Auth(_) | Error::Config(_) | Error::FailureBudgetExhausted { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_config_are_fatal() {
        assert!(Error::Auth("HTTP 401".into()).is_fatal());
        assert!(Error::Config("missing".into()).is_fatal());
    }

    #[test]
    fn network_and_exchange_errors_are_retryable() {
        assert!(!Error::Http("timeout".into()).is_fatal());
        assert!(!Error::Exchange("HTTP 503".into()).is_fatal());
        assert!(!Error::WebSocket("closed".into()).is_fatal());
    }
}
