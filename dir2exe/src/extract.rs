use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use dir2exe_core::{ArchiveSrc, Entry};
use log::{debug, warn};
use tempfile::TempDir;

use crate::ext::EntryExt;
use crate::{wrap_io_err, Error};

/// Prefix of every extraction root
const ROOT_PREFIX: &str = "d2e";

/// Create a fresh, uniquely named extraction root below `parent`, or below
/// the system temporary directory.
pub fn create_root(parent: Option<&Path>) -> Result<TempDir, Error> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(ROOT_PREFIX);
    match parent {
        Some(parent) => builder
            .tempdir_in(parent)
            .map_err(wrap_io_err!(parent, "Creating extraction root")),
        None => builder
            .tempdir()
            .map_err(wrap_io_err!("Creating extraction root")),
    }
}

/// Write every entry below `base_dir`, recreating its relative directory
/// structure. Entries are written in manifest order, so a later entry with
/// the same path replaces an earlier one.
///
/// Every path is checked before anything is written. Returns the path of
/// the extracted main executable, if there is one.
pub fn extract_entries<Src>(
    src: &mut Src,
    entries: &[Entry],
    base_dir: &Path,
    buf_size: usize,
) -> Result<Option<PathBuf>, Error>
where
    Src: ArchiveSrc,
    Error: From<Src::Err>,
{
    let mut relative_paths = Vec::with_capacity(entries.len());
    for entry in entries {
        relative_paths.push(entry.check_path()?);
    }

    let base_canonical =
        fs::canonicalize(base_dir).map_err(wrap_io_err!(base_dir, "Resolving extraction root"))?;

    let mut buf = vec![0; buf_size.max(1)];
    let mut executable = None;
    for (entry, relative_path) in entries.iter().zip(relative_paths) {
        let target_path = base_dir.join(&relative_path);
        debug!("Extracting {} to {}", entry, target_path.display());

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(wrap_io_err!(parent, "Creating directory"))?;
            let parent_canonical =
                fs::canonicalize(parent).map_err(wrap_io_err!(parent, "Resolving directory"))?;
            if !parent_canonical.starts_with(&base_canonical) {
                return Err(Error::InvalidPath {
                    entry: relative_path,
                    component: parent_canonical,
                });
            }
        }

        // A later entry replaces an earlier one outright, so the mode below
        // is always the one the file ends up with
        if let Err(source) = fs::remove_file(&target_path) {
            if source.kind() != io::ErrorKind::NotFound {
                return Err(Error::Io {
                    source,
                    path: Some(target_path),
                    context: "Replacing file",
                });
            }
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(if entry.is_executable() { 0o755 } else { 0o644 });
        let file = options
            .open(&target_path)
            .map_err(wrap_io_err!(target_path, "Creating file"))?;

        let mut writer = BufWriter::new(file);
        let mut offset = 0;
        loop {
            let count = src.read_entry(entry, offset, &mut buf)?;
            if count == 0 {
                break;
            }
            writer
                .write_all(&buf[..count])
                .map_err(wrap_io_err!(target_path, "Writing file"))?;
            offset += count as u64;
        }
        writer
            .flush()
            .map_err(wrap_io_err!(target_path, "Writing file"))?;

        if entry.is_executable() {
            executable = Some(target_path);
        }
    }

    Ok(executable)
}

/// Remove an extraction root and everything below it. Failure is only
/// reported, it never changes the outcome of a run.
pub fn cleanup(root: TempDir) {
    let path = root.path().to_path_buf();
    if let Err(source) = root.close() {
        warn!("{}", Error::CleanupFailure { path, source });
    }
}
