use crate::{Entry, Error, COUNT_SIZE, ENTRY_SIZE, MAX_ENTRIES};

/// Retrieve the size of a manifest holding `count` entries, including the
/// leading count field
pub fn manifest_size(count: u64) -> Result<u64, Error> {
    count
        .checked_mul(ENTRY_SIZE as u64)
        .and_then(|size| size.checked_add(COUNT_SIZE as u64))
        .ok_or(Error::Overflow)
}

/// Check the count field before anything is allocated for the entries.
/// `available` is the number of bytes between the manifest offset and the
/// footer.
pub(crate) fn check_count(count: u64, available: u64) -> Result<(), Error> {
    if count > MAX_ENTRIES {
        return Err(Error::TooManyEntries(count));
    }
    let expected = manifest_size(count)?;
    if expected != available {
        return Err(Error::ManifestSize {
            expected,
            actual: available,
        });
    }
    Ok(())
}

/// Validate parsed entries against the archive layout: every payload lies
/// before the manifest, flags are known, paths are plain relative paths and
/// at most one entry is executable.
pub fn validate_entries(entries: &[Entry], manifest_offset: u64) -> Result<(), Error> {
    let mut executables = 0;
    for (index, entry) in entries.iter().enumerate() {
        let (offset, size) = (entry.offset(), entry.size());
        let in_bounds = offset
            .checked_add(size)
            .is_some_and(|end| end <= manifest_offset);
        if !in_bounds {
            return Err(Error::EntryOutOfBounds {
                index: index as u64,
                offset,
                size,
            });
        }

        entry.flags()?;
        entry.path_components()?;

        if entry.is_executable() {
            executables += 1;
        }
    }

    if executables > 1 {
        return Err(Error::MultipleExecutables);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::{check_count, manifest_size, validate_entries};
    use crate::{Entry, EntryFlags, Error, MAX_ENTRIES};

    #[test]
    fn sizes() {
        assert_eq!(manifest_size(0).unwrap(), 8);
        assert_eq!(manifest_size(2).unwrap(), 8 + 2 * 277);
        assert!(matches!(manifest_size(u64::MAX), Err(Error::Overflow)));
    }

    #[test]
    fn count_bounds() {
        assert!(check_count(1, 8 + 277).is_ok());
        assert!(matches!(
            check_count(MAX_ENTRIES + 1, u64::MAX),
            Err(Error::TooManyEntries(_))
        ));
        assert!(matches!(
            check_count(2, 8 + 277),
            Err(Error::ManifestSize { .. })
        ));
    }

    #[test]
    fn entries_out_of_bounds() {
        let entries = vec![
            Entry::new(100, 5, EntryFlags::empty(), b"a").unwrap(),
            Entry::new(105, 10, EntryFlags::EXECUTABLE, b"b").unwrap(),
        ];
        assert!(validate_entries(&entries, 115).is_ok());
        assert!(matches!(
            validate_entries(&entries, 114),
            Err(Error::EntryOutOfBounds { index: 1, .. })
        ));

        let overflow = vec![Entry::new(u64::MAX, 2, EntryFlags::empty(), b"a").unwrap()];
        assert!(matches!(
            validate_entries(&overflow, u64::MAX),
            Err(Error::EntryOutOfBounds { index: 0, .. })
        ));
    }

    #[test]
    fn entries_multiple_executables() {
        let entries = vec![
            Entry::new(0, 1, EntryFlags::EXECUTABLE, b"a").unwrap(),
            Entry::new(1, 1, EntryFlags::EXECUTABLE, b"b").unwrap(),
        ];
        assert!(matches!(
            validate_entries(&entries, 2),
            Err(Error::MultipleExecutables)
        ));
    }

    #[test]
    fn entries_escaping_path() {
        let entries = vec![Entry::new(0, 1, EntryFlags::EXECUTABLE, b"..\\..\\evil.exe").unwrap()];
        assert!(matches!(
            validate_entries(&entries, 1),
            Err(Error::InvalidPath)
        ));
    }
}
