use bitflags::bitflags;

bitflags! {
    /// Per-entry flag byte
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        /// The program launched after extraction
        const EXECUTABLE = 1;
    }
}

impl Default for EntryFlags {
    fn default() -> Self {
        Self::empty()
    }
}
