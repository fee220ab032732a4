use std::error::Error as StdError;

/// Crate-wide result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed bridge errors.
///
/// `Validation` aborts a single event with no further side effects.
/// `Transport` aborts the handler at the failure point; side effects already
/// committed earlier in the same path stay committed. `ResourceCreation`
/// surfaces as a missing handle that callers skip over. None of these are
/// process-fatal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input or an operation the author is not allowed to perform.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// An origin or relay call failed.
    #[error("transport call failed: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A lazily-created resource (e.g. a channel webhook) could not be made.
    #[error("resource creation failed: {context}")]
    ResourceCreation { context: String },
}

impl Error {
    #[must_use]
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn resource_creation(context: impl Into<String>) -> Self {
        Self::ResourceCreation {
            context: context.into(),
        }
    }

    /// Whether this error should abort the event silently (already logged)
    /// rather than be reported to the sender.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_formats_reason() {
        let err = Error::validation("malformed expression");
        assert_eq!(err.to_string(), "validation failed: malformed expression");
    }

    #[test]
    fn transport_preserves_source() {
        let source = std::io::Error::other("connection reset");
        let err = Error::transport("relay send", source);
        assert!(err.is_transport());
        assert!(err.to_string().contains("relay send"));
        assert!(StdError::source(&err).is_some());
    }
}
