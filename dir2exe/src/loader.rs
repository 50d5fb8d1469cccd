use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dir2exe_core::ArchiveSrc;
use log::{error, info, warn};

use crate::{cleanup, create_root, extract_entries, launch, ArchiveFile, Error, WaitPolicy};
use crate::READ_WRITE_BUF_SIZE;

/// Runtime settings of the loader
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Directory extraction roots are created in, the system temporary
    /// directory if unset
    pub temp_parent: Option<PathBuf>,
    pub wait: WaitPolicy,
    pub buffer_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> LoaderConfig {
        LoaderConfig {
            temp_parent: None,
            wait: WaitPolicy::Forever,
            buffer_size: READ_WRITE_BUF_SIZE,
        }
    }
}

impl LoaderConfig {
    /// Read `DIR2EXE_TMPDIR`, `DIR2EXE_TIMEOUT_SECS` and
    /// `DIR2EXE_BUFFER_SIZE`. Values that cannot be used are reported and
    /// left at their defaults.
    pub fn from_env() -> LoaderConfig {
        LoaderConfig::from_vars(|key| env::var_os(key))
    }

    fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> LoaderConfig {
        let mut config = LoaderConfig::default();

        if let Some(dir) = var("DIR2EXE_TMPDIR").filter(|dir| !dir.is_empty()) {
            config.temp_parent = Some(PathBuf::from(dir));
        }

        if let Some(secs) = parse_var(&var, "DIR2EXE_TIMEOUT_SECS") {
            if secs > 0 {
                config.wait = WaitPolicy::Timeout(Duration::from_secs(secs));
            } else {
                warn!("Ignoring DIR2EXE_TIMEOUT_SECS=0");
            }
        }

        if let Some(size) = parse_var(&var, "DIR2EXE_BUFFER_SIZE") {
            match usize::try_from(size) {
                Ok(size) if size > 0 => config.buffer_size = size,
                _ => warn!("Ignoring DIR2EXE_BUFFER_SIZE={}", size),
            }
        }

        config
    }
}

fn parse_var(var: impl Fn(&str) -> Option<OsString>, key: &str) -> Option<u64> {
    let value = var(key)?;
    match value.to_str().and_then(|value| value.trim().parse().ok()) {
        Some(parsed) => Some(parsed),
        None => {
            warn!("Ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}

/// Extract the archive appended to `self_path` into a fresh directory, run
/// its main executable there with `args` and remove the directory again.
///
/// Returns the exit code the loader process should end with: the child's
/// own code, or the code of the error that stopped the run.
pub fn run_self_extracting(self_path: &Path, args: &[OsString], config: &LoaderConfig) -> i32 {
    match try_run(self_path, args, config) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            err.exit_code()
        }
    }
}

fn try_run(self_path: &Path, args: &[OsString], config: &LoaderConfig) -> Result<i32, Error> {
    let mut archive = ArchiveFile::new(self_path).map_err(|err| match err {
        Error::Io { source, .. } => Error::SelfOpenFailure {
            path: self_path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    let entries = archive.read_entries().map_err(|err| match err {
        Error::Core(core) => Error::InvalidArchiveSignature(core),
        other => other,
    })?;
    info!("{} entries in {}", entries.len(), archive.path().display());

    let root = create_root(config.temp_parent.as_deref())?;
    let result = extract_entries(&mut archive, &entries, root.path(), config.buffer_size)
        .and_then(|executable| executable.ok_or(Error::NoExecutableEntry))
        .and_then(|executable| launch(&executable, args, root.path(), config.wait));

    cleanup(root);
    result
}
