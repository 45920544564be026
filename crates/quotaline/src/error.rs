use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotalineError {
    #[error("Failed to read input: {0}")]
    Input(String),

    #[error("Config error: {0}")]
    ConfigParsing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client unavailable: {0}")]
    Client(String),

    #[error("Header error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("API request failed: status {0}")]
    Status(u16),

    #[error("API response contains no valid data")]
    EmptyResponse,

    #[error("Failed to fetch usage: {0}")]
    Fetch(Box<QuotalineError>),
}

impl From<toml::de::Error> for QuotalineError {
    fn from(err: toml::de::Error) -> Self {
        QuotalineError::ConfigParsing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QuotalineError>;
