use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum QontoError {
    #[error("invalid options: {0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("request failed - bad HTTP status returned: {status}")]
    Api { status: StatusCode },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("error decoding response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("error decoding {field}: invalid timestamp {value:?}")]
    Timestamp { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid environment variables: {0}")]
    Environment(#[from] envy::Error),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("config smtp.{0} is missing, smtp options are required for email notifications")]
    MissingSmtp(&'static str),

    #[error("invalid email address {value:?} for {field}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("webhook url seems invalid: {0:?}")]
    InvalidWebhook(String),

    #[error("invalid base url: {0:?}")]
    InvalidBaseUrl(String),

    #[error("unknown transaction status {0:?}")]
    UnknownStatus(String),
}
