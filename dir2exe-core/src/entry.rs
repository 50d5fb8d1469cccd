//! The packed structs represent the on-disk format of dir2exe
use alloc::vec::Vec;
use core::fmt::Display;
use core::str;

use bytemuck::{Pod, Zeroable};

use crate::{EntryFlags, Error, MAX_PATH};

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(packed, C)]
pub struct Entry {
    /// Absolute offset of file data in the archive, little-endian
    pub offset: u64,
    /// Size in bytes of the file data, little-endian
    pub size: u64,
    /// See [`EntryFlags`]
    pub flags: u8,
    /// NUL-terminated relative path from extract directory
    pub path: [u8; MAX_PATH],
}

impl Display for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let flags = self.flags;
        write!(
            f,
            "path={:?} offset={} size={} flags={:#04x}",
            str::from_utf8(self.path_bytes()).unwrap_or_default(),
            self.offset(),
            self.size(),
            flags
        )
    }
}

impl Entry {
    /// Create an entry, rejecting paths that do not fit in the path field
    /// together with their terminator.
    pub fn new(offset: u64, size: u64, flags: EntryFlags, path: &[u8]) -> Result<Entry, Error> {
        if path.len() >= MAX_PATH {
            return Err(Error::PathTooLong(path.len()));
        }
        if path.is_empty() || path.contains(&0) {
            return Err(Error::InvalidPath);
        }

        let mut entry = Entry {
            offset: offset.to_le(),
            size: size.to_le(),
            flags: flags.bits(),
            path: [0; MAX_PATH],
        };
        entry.path[..path.len()].copy_from_slice(path);
        Ok(entry)
    }

    pub fn offset(&self) -> u64 {
        u64::from_le(self.offset)
    }

    pub fn size(&self) -> u64 {
        u64::from_le(self.size)
    }

    pub fn flags(&self) -> Result<EntryFlags, Error> {
        EntryFlags::from_bits(self.flags).ok_or(Error::InvalidFlags(self.flags))
    }

    pub fn is_executable(&self) -> bool {
        self.flags().is_ok_and(|flags| flags.contains(EntryFlags::EXECUTABLE))
    }

    /// Retrieve the path, ending at the first NUL
    pub fn path_bytes(&self) -> &[u8] {
        let mut i = 0;
        while i < self.path.len() {
            if self.path[i] == 0 {
                break;
            }
            i += 1;
        }
        &self.path[..i]
    }

    /// Split the path into its components, treating both `/` and `\` as
    /// separators. Fails for anything that is not a plain relative path:
    /// empty, absolute, `.` or `..` components, drive or stream markers, and
    /// paths that are not UTF-8.
    pub fn path_components(&self) -> Result<Vec<&str>, Error> {
        let path = str::from_utf8(self.path_bytes()).map_err(|_| Error::InvalidPath)?;
        if path.is_empty() {
            return Err(Error::InvalidPath);
        }

        let mut components = Vec::new();
        for component in path.split(['/', '\\']) {
            match component {
                "" | "." | ".." => return Err(Error::InvalidPath),
                c if c.contains(':') => return Err(Error::InvalidPath),
                c => components.push(c),
            }
        }
        Ok(components)
    }
}
