use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::{wrap_io_err, Error};

/// A regular file found below the directory being packed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the walked root
    pub relative: PathBuf,
    /// Path of the file on the build system
    pub source: PathBuf,
}

/// Enumerate every regular file below `root`, depth first. Each directory is
/// visited in file name order so the same tree always walks the same way.
pub fn walk(root: impl AsRef<Path>) -> Result<Vec<WalkEntry>, Error> {
    let root = root.as_ref();
    folder_entries(root, root, Vec::new())
}

fn folder_entries(
    base: &Path,
    path: &Path,
    mut entries: Vec<WalkEntry>,
) -> Result<Vec<WalkEntry>, Error> {
    // Sort each folder's entries by the file name
    let mut read_dir = Vec::new();
    for entry_res in fs::read_dir(path).map_err(wrap_io_err!(path, "Reading directory"))? {
        read_dir.push(entry_res.map_err(wrap_io_err!(path, "Reading directory entry"))?);
    }
    read_dir.sort_by_key(|entry| entry.file_name());

    for entry in read_dir {
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(wrap_io_err!(entry_path, "Reading file type"))?;

        if file_type.is_dir() {
            entries = folder_entries(base, &entry_path, entries)?;
            continue;
        }

        if file_type.is_symlink() {
            // Links to files are packed as the file they point at; links to
            // directories are never descended
            match fs::metadata(&entry_path) {
                Ok(metadata) if metadata.is_file() => {}
                Ok(_) => {
                    warn!("Skipping link to non-file: {}", entry_path.display());
                    continue;
                }
                Err(err) => {
                    warn!("Skipping broken link {}: {}", entry_path.display(), err);
                    continue;
                }
            }
        } else if !file_type.is_file() {
            warn!("Skipping unsupported file type: {}", entry_path.display());
            continue;
        }

        let relative = entry_path
            .strip_prefix(base)
            .map_err(|_| Error::InvalidPath {
                entry: entry_path.clone(),
                component: base.to_path_buf(),
            })?
            .to_path_buf();
        entries.push(WalkEntry {
            relative,
            source: entry_path,
        });
    }

    Ok(entries)
}
