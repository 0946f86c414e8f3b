use thiserror::Error;

/// Misuse of the optimistic log contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("No message at index {index} (log has {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Message at index {index} is committed and can no longer change")]
    Committed { index: usize },
}
