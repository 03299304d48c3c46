use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Error interacting with the remote CRM API (transport, protocol, parse).
    ExternalApiError(String),
    /// Resource not found.
    NotFound(String),
    /// The CRM rejected a contact or lead creation.
    CreationRejected(String),
    /// The CRM rejected an update to an already existing contact.
    ReconciliationRejected(String),
    /// The account's field catalog carries no custom field with this code.
    MissingFieldId(String),
    /// Internal error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::CreationRejected(msg) => write!(f, "Creation rejected: {}", msg),
            AppError::ReconciliationRejected(msg) => {
                write!(f, "Reconciliation rejected: {}", msg)
            }
            AppError::MissingFieldId(code) => {
                write!(f, "No '{}' custom field in the account catalog", code)
            }
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Arguments
    ///
    /// * `f` - A closure that produces the context message.
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_prefixes_the_underlying_error() {
        let err: Result<(), AppError> = Err(AppError::NotFound("contact 7".to_string()));
        let err = err.context("fetching contact after creation").unwrap_err();
        assert_eq!(
            err.to_string(),
            "fetching contact after creation: Not found: contact 7"
        );
    }

    #[test]
    fn with_context_is_lazy() {
        let ok: Result<u8, AppError> = Ok(3);
        let value = ok
            .with_context(|| unreachable!("must not be evaluated on Ok"))
            .unwrap();
        assert_eq!(value, 3);
    }
}
