//! Errors from building value types out of text

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid MAC address {input:?}: {reason}")]
    InvalidMac { input: String, reason: String },
}

impl Error {
    pub(crate) fn invalid_mac(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMac {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
