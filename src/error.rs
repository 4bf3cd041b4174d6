use std::io;
use std::path::PathBuf;

// The OS error text is part of each message and is not exposed as a source,
// so a report prints it once.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("failed to open directory '{}': {}", .path.display(), .err)]
    Open { path: PathBuf, err: io::Error },

    #[error("failed to stat file '{}': {}", .path.display(), .err)]
    Stat { path: PathBuf, err: io::Error },

    #[error("failed to write output: {0}")]
    Output(io::Error),
}

impl Error {
    pub(crate) fn is_broken_pipe(&self) -> bool {
        match self {
            Error::Output(err) => err.kind() == io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Output(err)
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
