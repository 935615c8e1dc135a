use thiserror::Error;

/// Every way a round-trip with the chat backend can fail. Callers treat all
/// variants the same: the request produced nothing usable.
#[derive(Debug, Error)]
pub enum ApiTransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chat backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
}

impl From<url::ParseError> for ApiTransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
