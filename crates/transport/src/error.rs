use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A line that is neither data, event, comment nor blank
    #[error("Invalid event-stream line: '{0}'")]
    InvalidFormat(String),

    #[error("Event stream is not valid UTF-8")]
    InvalidEncoding,
}
