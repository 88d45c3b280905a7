// Error taxonomy for the chat relay

use thiserror::Error;

/// Errors raised by the registry, relation store and connection handler.
///
/// `LineTooLong` and `Connection` end a session. The others are per-name outcomes the
/// handler either reports back to the acting session or drops.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The candidate name is blank or already held by a live session
    #[error("name is blank or already taken")]
    DuplicateOrBlankName,

    /// A session tried to block or unblock itself
    #[error("{0} cannot block or unblock themselves")]
    SelfBlock(String),

    /// A session tried to add itself to its own private group
    #[error("{0} cannot add themselves to their private group")]
    SelfGroup(String),

    /// The group target is not a registered name
    #[error("{0} is not connected")]
    UnregisteredGroupTarget(String),

    /// An inbound line exceeded the configured limit
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Read or write failure on the session's connection
    #[error("connection fault: {0}")]
    Connection(#[from] std::io::Error),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert_to_connection_faults() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err = ChatError::from(io);
        assert!(matches!(err, ChatError::Connection(_)));
        assert_eq!(err.to_string(), "connection fault: gone");
    }

    #[test]
    fn test_error_messages_name_the_target() {
        let err = ChatError::SelfGroup("alice".to_string());
        assert_eq!(
            err.to_string(),
            "alice cannot add themselves to their private group"
        );
        assert_eq!(ChatError::LineTooLong(16).to_string(), "line exceeds 16 bytes");
    }
}
