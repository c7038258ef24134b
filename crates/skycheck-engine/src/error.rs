//! Error kinds shared across the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// An input file (KML, coordinates, parameters) could not be understood.
    #[error("malformed input: {0}")]
    InputMalformed(String),

    /// The input is valid but uses a feature outside the supported profile.
    #[error("unsupported input: {0}")]
    InputUnsupported(String),

    /// The airspace dataset or database is missing or unreadable.
    #[error("dataset missing: {0}")]
    DatasetMissing(String),

    /// Extraction finished but too many records were dropped.
    #[error("dataset incomplete: {kept} of {total} records extracted")]
    DatasetIncomplete { kept: usize, total: usize },

    /// A network service could not be reached.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// A network call or budget expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Bug-shaped failures: database errors, XML writer errors, ...
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Recoverable errors let a pipeline degrade instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::InputMalformed(_) | Error::DatasetMissing(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Internal(format!("database: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::DatasetMissing(err.to_string()),
            _ => Error::Internal(format!("io: {err}")),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::InputMalformed(format!("xml: {err}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else {
            Error::NetworkUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_kinds_are_not_recoverable() {
        assert!(!Error::InputMalformed("x".into()).is_recoverable());
        assert!(!Error::DatasetMissing("x".into()).is_recoverable());
        assert!(Error::Timeout("x".into()).is_recoverable());
        assert!(Error::Cancelled.is_recoverable());
    }
}
