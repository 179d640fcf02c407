use thiserror::Error;

/// Failures talking to the key-value store. Never retried by the store itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("Store pool error: {0}")]
    Pool(String),
}

/// Failures fetching a page from the GitHub API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid rate limit reset time {value:?}: {source}")]
    ResetTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    MalformedResponse(&'static str),
}

#[derive(Error, Debug)]
pub enum StarQueryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub API error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StarQueryError>;
