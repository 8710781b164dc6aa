use thiserror::Error;

/// A violation of the wire format.
///
/// The `Display` text doubles as the message of the `ERROR` reply, so keep it
/// short and free of request contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty command")]
    EmptyCommand,
    #[error("Malformed command")]
    MalformedCommand,
    #[error("Closing quote missing")]
    ClosingQuoteMissing,
    #[error("Garbage after closing quote")]
    GarbageAfterClosingQuote,
    #[error("Bad header syntax")]
    BadHeaderSyntax,
    #[error("Malformed UTF-8")]
    MalformedUtf8,
}
