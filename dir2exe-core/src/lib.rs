#![no_std]
extern crate alloc;

use core::mem;

pub use crate::archive::ArchiveSrc;
pub use crate::entry::Entry;
pub use crate::error::Error;
pub use crate::flags::EntryFlags;
pub use crate::footer::Footer;
pub use crate::manifest::{manifest_size, validate_entries};

mod archive;
mod entry;
mod error;
mod flags;
mod footer;
mod manifest;

/// Signature stored in every footer, NUL-terminated
pub const MAGIC: [u8; 8] = *b"DIR2EXE\0";

/// Capacity of the NUL-terminated path field of an entry
pub const MAX_PATH: usize = 260;

/// Upper bound on the entry count a loader will accept
pub const MAX_ENTRIES: u64 = 1 << 20;

pub const FOOTER_SIZE: usize = mem::size_of::<Footer>();
pub const ENTRY_SIZE: usize = mem::size_of::<Entry>();

/// Size of the `entry_count` field that starts the manifest
pub const COUNT_SIZE: usize = mem::size_of::<u64>();

#[cfg(test)]
mod tests {
    use core::mem;

    use crate::{Entry, Footer, ENTRY_SIZE, FOOTER_SIZE, MAX_PATH};

    #[test]
    fn footer_size() {
        assert_eq!(mem::size_of::<Footer>(), 16);
        assert_eq!(FOOTER_SIZE, 16);
    }

    #[test]
    fn entry_size() {
        assert_eq!(mem::size_of::<Entry>(), 17 + MAX_PATH);
        assert_eq!(ENTRY_SIZE, 277);
    }
}
