use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    /// Rejected before touching storage: negative amount, missing datetime,
    /// inverted range.
    InvalidInput(String),
    /// No snapshot exists at or before the requested instant.
    NotFound,
    Storage(String),
    UnexpectedType(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidInput(what) => write!(f, "Invalid input: {}", what),
            Error::NotFound => write!(f, "Not found"),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
            Error::UnexpectedType(err) => write!(f, "Unexpected type: {}", err),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
