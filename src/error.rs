//! Error taxonomy for the chat core
//!
//! Remote failures (transport or payload) abort a turn; import failures
//! leave stored state untouched; storage failures bubble to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Remote call rejected, network failure, or non-success status
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote payload could not be decoded
    #[error("malformed response: {0}")]
    Parse(String),

    /// Imported bytes are not a chat collection
    #[error("invalid chat file format: {0}")]
    Import(String),

    /// Reading or writing the local collection failed
    #[error("storage error: {0}")]
    Storage(String),

    #[error("session not found: {0}")]
    UnknownSession(String),
}

impl ChatError {
    /// True for failures that end a remote turn with an error message
    pub fn is_remote(&self) -> bool {
        matches!(self, ChatError::Transport(_) | ChatError::Parse(_))
    }
}

impl From<std::io::Error> for ChatError {
    fn from(e: std::io::Error) -> Self {
        ChatError::Storage(e.to_string())
    }
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_classification() {
        assert!(ChatError::Transport("refused".into()).is_remote());
        assert!(ChatError::Parse("eof".into()).is_remote());
        assert!(!ChatError::Import("bad".into()).is_remote());
    }

    #[test]
    fn test_import_message() {
        let e = ChatError::Import("expected value".into());
        assert!(e.to_string().starts_with("invalid chat file format"));
    }
}
