use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrialError {
    #[error("audit trial {field} is not a valid datetime: '{value}'")]
    MalformedDate { field: &'static str, value: String },

    #[error("audit trial expires before it starts")]
    ExpiresBeforeStart,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
