use std::io;

use thiserror::Error;

pub type SalmonResult<T> = Result<T, SalmonError>;

#[derive(Debug, Error)]
pub enum SalmonError {
    /// Missing or invalid key material, nonce, header, or a transformer used
    /// before initialization.
    #[error("security error: {0}")]
    Security(String),

    /// A chunk signature did not match its data.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Nonce or counter arithmetic overflowed its reserved range.
    #[error("range exceeded: {0}")]
    RangeExceeded(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl SalmonError {
    /// Wrap this error for transport through the `std::io` traits.
    ///
    /// The original variant is recovered by `From<io::Error>`.
    pub fn into_io(self) -> io::Error {
        match self {
            SalmonError::Io(err) => err,
            SalmonError::Integrity(_) => io::Error::new(io::ErrorKind::InvalidData, self),
            other => io::Error::other(other),
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, SalmonError::Integrity(_))
    }
}

impl From<io::Error> for SalmonError {
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<SalmonError>()) {
            return SalmonError::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<SalmonError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(inner)) => SalmonError::Io(io::Error::new(kind, inner)),
            None => SalmonError::Io(io::Error::from(kind)),
        }
    }
}
