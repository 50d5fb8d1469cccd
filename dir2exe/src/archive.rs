use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use dir2exe_core::ArchiveSrc;

use crate::{wrap_io_err, Error};

/// A self-extracting archive on disk, usually the running loader itself
#[derive(Debug)]
pub struct ArchiveFile {
    path: PathBuf,
    src: BufReader<File>,
    len: u64,
}

impl ArchiveFile {
    pub fn new(path: impl AsRef<Path>) -> Result<ArchiveFile, Error> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| Error::Io {
                source,
                path: Some(path.clone()),
                context: "Open",
            })?;
        let len = file
            .metadata()
            .map_err(wrap_io_err!(path, "Reading metadata"))?
            .len();

        Ok(ArchiveFile {
            path,
            src: BufReader::new(file),
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveSrc for ArchiveFile {
    type Err = Error;

    fn archive_len(&mut self) -> Result<u64, Error> {
        Ok(self.len)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        self.src
            .seek(SeekFrom::Start(offset))
            .map_err(wrap_io_err!(self.path, "Seek at read_at"))?;
        self.src
            .read_exact(buf)
            .map_err(wrap_io_err!(self.path, "Read at read_at"))?;
        Ok(())
    }
}
