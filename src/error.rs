use thiserror::Error;

/// Errors of the Tasmota protocol layer. None of them is fatal: callers
/// either drop the offending message or turn it into a user warning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Topic (or its last segment) does not follow the expected command pattern.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Payload value is not one of the recognised ones.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
