use thiserror::Error;

/// Errors returned when building a token codec.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("signing secret was rejected by the mac")]
    InvalidSecret,
}
