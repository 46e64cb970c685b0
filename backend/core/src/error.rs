use thiserror::Error;

/// Rejection reasons for a port value supplied by an operator or read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("'{0}' is not a port number")]
    NotANumber(String),

    #[error("port {0} is outside the range 1-65535")]
    OutOfRange(i64),
}
