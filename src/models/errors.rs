use thiserror::Error;

/// Ошибки транспорта чата
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport rejected the payload because of its size limit.
    #[error("payload too large: {0}")]
    TooLarge(String),
    #[error("telegram api error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("http error: {0}")]
    Http(String),
}

impl TransportError {
    pub fn is_too_large(&self) -> bool {
        matches!(self, TransportError::TooLarge(_))
    }

    /// Сопоставляет ответ Bot API с таксономией ошибок.
    pub fn from_api(code: i64, description: impl Into<String>) -> Self {
        let description = description.into();
        let lower = description.to_lowercase();
        if code == 413 || lower.contains("too big") || lower.contains("too large") {
            TransportError::TooLarge(description)
        } else {
            TransportError::Api { code, description }
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

/// Ошибки конвейера обработки одного сообщения
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("url resolution failed: {0}")]
    Resolution(String),
    #[error("fetch of {url} failed after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: usize,
        last_error: String,
    },
    #[error("post element not found in document")]
    MalformedDocument,
    #[error("unsupported post category: {0}")]
    UnsupportedCategory(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("local storage error: {0}")]
    LocalStorage(String),
}

impl RelayError {
    pub fn is_too_large(&self) -> bool {
        matches!(self, RelayError::Transport(t) if t.is_too_large())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::LocalStorage(e.to_string())
    }
}
