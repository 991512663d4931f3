use thiserror::Error;

pub type Result<T> = std::result::Result<T, RapidApiError>;

#[derive(Debug, Error)]
pub enum RapidApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl RapidApiError {
    /// Upstream answered but the tweet does not exist or is not visible to us.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RapidApiError::Api { status: 404, .. })
    }
}

impl From<reqwest::Error> for RapidApiError {
    fn from(err: reqwest::Error) -> Self {
        RapidApiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RapidApiError {
    fn from(err: serde_json::Error) -> Self {
        RapidApiError::Parse(err.to_string())
    }
}
