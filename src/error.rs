use thiserror::Error;

/// Errors returned by the setup and submission side of recipe scanning.
///
/// Fetch and extraction failures never surface here; they are reported as
/// fields on [`crate::RecipeRecord`] so every outcome travels the same channel.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The submitted URL could not be parsed
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The submitted URL has no host component to key a site queue on
    #[error("URL has no host: {0}")]
    MissingHost(String),

    /// The per-site queue worker has stopped accepting URLs
    #[error("Queue for {0} is closed")]
    QueueClosed(String),

    /// Failed to build or use the HTTP client
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error parsing HTTP headers
    #[error("Header parse error: {0}")]
    HeaderError(#[from] reqwest::header::InvalidHeaderValue),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// Batch input/output error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Batch file contains no usable rows
    #[error("No records found in CSV file {0}")]
    EmptyCsv(String),

    /// Batch file has no url column
    #[error("Missing required header 'url' in {0}")]
    MissingUrlColumn(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failed network exchange, before any HTTP status was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// The response body could not be turned into bytes fit for parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{encoding} decompression failed: {reason}")]
    Decompress { encoding: String, reason: String },
}

/// The markup tree could not be built from a body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("document is empty")]
    Empty,

    #[error("document looks like binary data, not markup")]
    Binary,
}
