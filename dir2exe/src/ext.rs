//! Extention traits for base types defined in `dir2exe-core`.
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use dir2exe_core::Entry;

use crate::Error;

pub trait EntryExt {
    fn check_path(&self) -> Result<PathBuf, Error>;
}

impl EntryExt for Entry {
    /// Iterate the components of the path and ensure that there are no
    /// non-normal components, then rebuild it with the host separator.
    fn check_path(&self) -> Result<PathBuf, Error> {
        Ok(self.path_components()?.into_iter().collect())
    }
}

/// Serialize a relative target path for an entry, joining its components
/// with the host separator. Only normal, UTF-8 components are accepted.
pub fn target_path_string(target: &Path) -> Result<String, Error> {
    let mut out = String::new();
    for component in target.components() {
        let invalid = |component: &Path| Error::InvalidPath {
            entry: target.to_path_buf(),
            component: component.to_path_buf(),
        };
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| invalid(Path::new(name)))?;
                if !out.is_empty() {
                    out.push(MAIN_SEPARATOR);
                }
                out.push_str(name);
            }
            other => return Err(invalid(other.as_ref())),
        }
    }

    if out.is_empty() {
        return Err(Error::InvalidPath {
            entry: target.to_path_buf(),
            component: PathBuf::new(),
        });
    }
    Ok(out)
}

/// Failure of [`copy_buffered`], split by the side that failed
#[derive(Debug)]
pub enum CopyError {
    /// Reading failed after `copied` bytes were already written
    Read { copied: u64, source: io::Error },
    Write(io::Error),
}

/// Copy everything from `read` to `write` through `buf`, so memory use does
/// not depend on the size of the source. Returns the number of bytes copied.
pub fn copy_buffered<R: Read, W: Write>(
    mut read: R,
    mut write: W,
    buf: &mut [u8],
) -> Result<u64, CopyError> {
    let mut total = 0;
    loop {
        let count = match read.read(buf) {
            Ok(0) => break,
            Ok(count) => count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(CopyError::Read { copied: total, source }),
        };
        write.write_all(&buf[..count]).map_err(CopyError::Write)?;
        total += count as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf, MAIN_SEPARATOR};

    use dir2exe_core::{Entry, EntryFlags};

    use super::{copy_buffered, target_path_string, CopyError, EntryExt};
    use crate::Error;

    #[test]
    fn target_path_uses_host_separator() {
        let target = Path::new("Content").join("sub").join("readme.txt");
        assert_eq!(
            target_path_string(&target).unwrap(),
            format!("Content{0}sub{0}readme.txt", MAIN_SEPARATOR)
        );
    }

    #[test]
    fn target_path_rejects_non_normal() {
        for bad in ["../evil", "/abs", "./a", ""] {
            assert!(
                matches!(target_path_string(Path::new(bad)), Err(Error::InvalidPath { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn check_path_rebuilds() {
        let entry = Entry::new(0, 0, EntryFlags::empty(), b"Content\\readme.txt").unwrap();
        assert_eq!(
            entry.check_path().unwrap(),
            ["Content", "readme.txt"].iter().collect::<PathBuf>()
        );
    }

    #[test]
    fn copy_in_small_chunks() {
        let data = vec![7u8; 1000];
        let mut out = Vec::new();
        let mut buf = [0; 7];
        assert_eq!(copy_buffered(&data[..], &mut out, &mut buf).unwrap(), 1000);
        assert_eq!(out, data);
    }

    struct FailingReader(usize);

    impl io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "gone"));
            }
            let count = self.0.min(buf.len());
            self.0 -= count;
            Ok(count)
        }
    }

    #[test]
    fn copy_reports_read_failure() {
        let mut out = Vec::new();
        let mut buf = [0; 4];
        match copy_buffered(FailingReader(6), &mut out, &mut buf) {
            Err(CopyError::Read { copied, .. }) => assert_eq!(copied, 6),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(out.len(), 6);
    }
}
