use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Manifest,
    Filesystem,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("manifest line {line} is malformed: '{content}' split into {parts:?}")]
    MalformedLine {
        line: usize,
        content: String,
        parts: Vec<String>,
    },

    #[error("unknown destination token '{token}' on manifest line {line}: '{content}'")]
    UnknownToken {
        token: String,
        line: usize,
        content: String,
    },

    #[error("source for manifest line {line} does not exist: {} ('{content}')", path.display())]
    MissingSource {
        line: usize,
        content: String,
        path: PathBuf,
    },

    #[error("manifest not found: {}", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("archive entry not found: {entry}")]
    ArchiveEntryNotFound { entry: String },

    #[error("manifest bound to archive entry '{entry}' is read-only")]
    ReadOnlyBinding { entry: String },

    #[error("destination directory does not exist: {}", path.display())]
    DestinationDirMissing { path: PathBuf },

    #[error("recursion limit of {limit} exceeded at {} while processing {}", current.display(), original.display())]
    RecursionLimit {
        current: PathBuf,
        original: PathBuf,
        limit: usize,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {message}")]
    Archive { context: String, message: String },

    #[error("host query '{query}' failed: {message}")]
    Host { query: String, message: String },

    #[error("installer worker stopped unexpectedly: {message}")]
    Worker { message: String },
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MalformedLine { .. }
            | Self::UnknownToken { .. }
            | Self::MissingSource { .. }
            | Self::ManifestNotFound { .. }
            | Self::ArchiveEntryNotFound { .. }
            | Self::ReadOnlyBinding { .. } => ErrorCategory::Manifest,
            Self::DestinationDirMissing { .. }
            | Self::RecursionLimit { .. }
            | Self::Io { .. }
            | Self::Archive { .. }
            | Self::Host { .. }
            | Self::Worker { .. } => ErrorCategory::Filesystem,
        }
    }

    /// Transient conditions a startup re-read may recover from.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::ManifestNotFound { .. } | Self::Archive { .. }
        )
    }
}

/// Attaches a path-bearing context to `io::Result`, in the spirit of
/// `anyhow::Context` but producing a typed [`Error::Io`].
pub trait IoContext<T> {
    fn io_context<F, C>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context<F, C>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|source| Error::io(context(), source))
    }
}
