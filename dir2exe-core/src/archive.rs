use alloc::vec;
use alloc::vec::Vec;
use core::convert::{AsRef, TryFrom};

use crate::manifest::check_count;
use crate::{validate_entries, Entry, Error, Footer, COUNT_SIZE, FOOTER_SIZE};

/// Random access to a complete archive: loader stub, payload, manifest and
/// footer.
pub trait ArchiveSrc {
    type Err: From<Error>;

    /// Total length of the archive in bytes
    fn archive_len(&mut self) -> Result<u64, Self::Err>;

    /// Fill all of `buf` with the bytes starting at `offset`
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Self::Err>;

    /// Read the trailing footer and check its signature
    fn read_footer(&mut self) -> Result<Footer, Self::Err> {
        let len = self.archive_len()?;
        if len < FOOTER_SIZE as u64 {
            return Err(Error::TooShort(len).into());
        }

        let mut data = [0; FOOTER_SIZE];
        self.read_at(len - FOOTER_SIZE as u64, &mut data)?;
        Ok(Footer::parse(&data)?)
    }

    /// Read and validate the manifest. Nothing returned from here points
    /// outside of the payload region or outside of the extraction root.
    fn read_entries(&mut self) -> Result<Vec<Entry>, Self::Err> {
        let footer = self.read_footer()?;
        let footer_offset = self.archive_len()? - FOOTER_SIZE as u64;

        let manifest_offset = footer.manifest_offset();
        let available = footer_offset
            .checked_sub(manifest_offset)
            .ok_or(Error::ManifestOffset(manifest_offset))?;
        if available < COUNT_SIZE as u64 {
            return Err(Error::ManifestSize {
                expected: COUNT_SIZE as u64,
                actual: available,
            }
            .into());
        }

        let mut count_data = [0; COUNT_SIZE];
        self.read_at(manifest_offset, &mut count_data)?;
        let count = u64::from_le_bytes(count_data);
        check_count(count, available)?;

        let entries_size = usize::try_from(available - COUNT_SIZE as u64).map_err(Error::from)?;
        let mut entries_data = vec![0; entries_size];
        self.read_at(manifest_offset + COUNT_SIZE as u64, &mut entries_data)?;

        let entries: Vec<Entry> = bytemuck::try_cast_slice::<u8, Entry>(&entries_data)
            .map_err(Error::from)?
            .to_vec();
        validate_entries(&entries, manifest_offset)?;
        Ok(entries)
    }

    /// Read from this src at a given entry's data with a given offset within
    /// that entry. Returns the number of bytes placed in `buf`, 0 at the end
    /// of the entry.
    fn read_entry(&mut self, entry: &Entry, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Err> {
        let size = entry.size();
        if offset >= size {
            return Ok(0);
        }

        let end = usize::try_from(size - offset)
            .map(|remaining| remaining.min(buf.len()))
            .unwrap_or(buf.len());
        let start = entry.offset().checked_add(offset).ok_or(Error::Overflow)?;

        self.read_at(start, &mut buf[..end])?;
        Ok(end)
    }
}

impl<T: AsRef<[u8]>> ArchiveSrc for T {
    type Err = Error;

    fn archive_len(&mut self) -> Result<u64, Error> {
        Ok(self.as_ref().len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let data = self.as_ref();
        let start = usize::try_from(offset)?;
        let end = start.checked_add(buf.len()).ok_or(Error::Overflow)?;
        let src = data.get(start..end).ok_or(Error::TooShort(data.len() as u64))?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::ArchiveSrc;
    use crate::{Entry, EntryFlags, Error, Footer, FOOTER_SIZE};

    const STUB: &[u8] = b"\x7fELF not really a loader";

    // stub | "hello" | "exe!" | manifest | footer
    fn archive() -> Vec<u8> {
        let mut data = STUB.to_vec();
        let hello = data.len() as u64;
        data.extend_from_slice(b"hello");
        let exe = data.len() as u64;
        data.extend_from_slice(b"exe!");

        let manifest_offset = data.len() as u64;
        let entries = [
            Entry::new(hello, 5, EntryFlags::empty(), b"Content/readme.txt").unwrap(),
            Entry::new(exe, 4, EntryFlags::EXECUTABLE, b"Game.exe").unwrap(),
        ];
        data.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        data.extend_from_slice(bytemuck::cast_slice::<Entry, u8>(&entries[..]));
        data.extend_from_slice(Footer::new(manifest_offset).as_bytes());
        data
    }

    #[test]
    fn read_entries_and_data() {
        let mut src = archive();
        let entries = src.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path_bytes(), b"Content/readme.txt");
        assert!(entries[1].is_executable());

        let mut buf = [0; 3];
        assert_eq!(src.read_entry(&entries[0], 0, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(src.read_entry(&entries[0], 3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(src.read_entry(&entries[0], 5, &mut buf).unwrap(), 0);
    }

    #[test]
    fn corrupt_magic() {
        let mut src = archive();
        let len = src.len();
        src[len - FOOTER_SIZE + 8] ^= 0xff;
        assert!(matches!(src.read_entries(), Err(Error::InvalidMagic)));
    }

    #[test]
    fn too_short() {
        let mut src = b"DIR2EXE".to_vec();
        assert!(matches!(src.read_footer(), Err(Error::TooShort(7))));
    }

    #[test]
    fn manifest_offset_past_footer() {
        let mut src = archive();
        let len = src.len();
        let bogus = Footer::new(len as u64);
        src[len - FOOTER_SIZE..].copy_from_slice(bogus.as_bytes());
        assert!(matches!(src.read_entries(), Err(Error::ManifestOffset(_))));
    }

    #[test]
    fn count_mismatch() {
        let mut src = archive();
        let manifest_offset = STUB.len() + 9;
        src[manifest_offset..manifest_offset + 8].copy_from_slice(&3u64.to_le_bytes());
        assert!(matches!(
            src.read_entries(),
            Err(Error::ManifestSize { .. })
        ));

        src[manifest_offset..manifest_offset + 8].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(src.read_entries(), Err(Error::TooManyEntries(_))));
    }
}
