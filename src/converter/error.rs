/// A conversion that exhausted its attempts without producing a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
    attempts: u32,
}

impl ConversionError {
    pub(crate) fn new(message: impl Into<String>, attempts: u32) -> Self {
        Self {
            message: message.into(),
            attempts,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
