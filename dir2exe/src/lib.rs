mod archive;
mod builder;
pub mod ext;
mod extract;
mod launcher;
mod loader;
mod walker;

pub use archive::ArchiveFile;
pub use builder::{build, build_with_config, read_loader_stub, ArchiveBuilder, BuildConfig, OnUnreadable};
pub use extract::{cleanup, create_root, extract_entries};
pub use launcher::{launch, WaitPolicy};
pub use loader::{run_self_extracting, LoaderConfig};
pub use walker::{walk, WalkEntry};

pub use dir2exe_core as core;

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Size of the transfer buffer used while packing and extracting
pub const READ_WRITE_BUF_SIZE: usize = 1024 * 1024;

#[derive(thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] dir2exe_core::Error),

    #[error("Io: {}{}", .context, .path.as_ref().map(|p| format!(": {}", p.display())).unwrap_or_default())]
    Io {
        #[source]
        source: io::Error,
        path: Option<PathBuf>,
        context: &'static str,
    },

    #[error("Loader stub not found or empty; build dir2exe-loader first")]
    MissingLoaderStub {
        #[source]
        source: Option<io::Error>,
    },

    #[error("Could not create output file {}", .path.display())]
    UnreadableOutputPath {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not read input file {}", .path.display())]
    UnreadableInputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid path component {} in {}", .component.display(), .entry.display())]
    InvalidPath { entry: PathBuf, component: PathBuf },

    #[error("More than one main executable: {}", .path.display())]
    DuplicateExecutable { path: PathBuf },

    #[error("Could not open own executable {}", .path.display())]
    SelfOpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid archive signature")]
    InvalidArchiveSignature(#[source] dir2exe_core::Error),

    #[error("Archive has no executable entry")]
    NoExecutableEntry,

    #[error("Failed to launch {}", .path.display())]
    ChildLaunchFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} did not exit within {:?}", .path.display(), .timeout)]
    ChildTimeout { path: PathBuf, timeout: Duration },

    #[error("Failed to remove extraction root {}", .path.display())]
    CleanupFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Process exit code reported by the loader for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArchiveSignature(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")?;

        let mut source = self.source();
        while let Some(err) = source {
            writeln!(f, "\tCaused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}

/// Build a closure turning an [`io::Error`] into [`Error::Io`], optionally
/// with the path the operation was working on.
#[macro_export]
macro_rules! wrap_io_err {
    ($path:expr, $context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: Some($path.to_path_buf()),
            context: $context,
        }
    };
    ($context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: None,
            context: $context,
        }
    };
}
