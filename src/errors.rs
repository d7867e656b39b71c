use std::fmt;

/// Errors produced while building or dispatching an underwriting request.
///
/// A non-200 answer from the underwriting endpoint is not an error; it is
/// reported as `Ok(None)` by the dispatcher.
#[derive(Debug)]
pub enum UnderwritingError {
    /// The rating request cannot be turned into an underwriting request.
    InvalidInput(String),
    /// A domain object could not be serialized into a JSON record.
    Serialization(String),
    /// The underwriting service could not be started or never became healthy.
    ServiceUnavailable(String),
    /// Transport-level failure talking to the underwriting service.
    ExternalApiError(String),
    /// Invalid configuration.
    Configuration(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<UnderwritingError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for UnderwritingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnderwritingError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            UnderwritingError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            UnderwritingError::ServiceUnavailable(msg) => {
                write!(f, "Service unavailable: {}", msg)
            }
            UnderwritingError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            UnderwritingError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            UnderwritingError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for UnderwritingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UnderwritingError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl UnderwritingError {
    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &UnderwritingError {
        match self {
            UnderwritingError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for UnderwritingError {
    /// Converts a `reqwest::Error` into an `UnderwritingError`.
    fn from(err: reqwest::Error) -> Self {
        UnderwritingError::ExternalApiError(err.to_string())
    }
}

impl From<serde_json::Error> for UnderwritingError {
    /// Converts a `serde_json::Error` into an `UnderwritingError`.
    fn from(err: serde_json::Error) -> Self {
        UnderwritingError::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `UnderwritingError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, UnderwritingError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, UnderwritingError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, UnderwritingError> {
    fn context(self, context: impl Into<String>) -> Result<T, UnderwritingError> {
        self.map_err(|e| UnderwritingError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, UnderwritingError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| UnderwritingError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for reqwest::Error to add context
impl<T> ResultExt<T> for Result<T, reqwest::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, UnderwritingError> {
        self.map_err(|e| UnderwritingError::WithContext {
            source: Box::new(UnderwritingError::from(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, UnderwritingError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| UnderwritingError::WithContext {
            source: Box::new(UnderwritingError::from(e)),
            context: f(),
        })
    }
}
