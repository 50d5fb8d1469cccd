use alloc::format;
use alloc::string::ToString;
use bytemuck::PodCastError;
use core::error;
use core::fmt::{Display, Formatter, Result};

#[derive(Debug)]
pub enum Error {
    Cast(PodCastError),
    EntryOutOfBounds { index: u64, offset: u64, size: u64 },
    InvalidFlags(u8),
    InvalidMagic,
    InvalidPath,
    ManifestOffset(u64),
    ManifestSize { expected: u64, actual: u64 },
    MultipleExecutables,
    Overflow,
    PathTooLong(usize),
    TooManyEntries(u64),
    TooShort(u64),
    TryFromInt(core::num::TryFromIntError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> Result {
        use Error::*;

        let msg = match self {
            Cast(err) => format!("Bytemuck: {}", err),
            EntryOutOfBounds { index, offset, size } => format!(
                "Entry {} out of bounds: offset={} size={}",
                index, offset, size
            ),
            InvalidFlags(flags) => format!("Invalid Flags: {:#04x}", flags),
            InvalidMagic => "Invalid archive signature".to_string(),
            InvalidPath => "Invalid entry path".to_string(),
            ManifestOffset(offset) => format!("Manifest offset out of bounds: {}", offset),
            ManifestSize { expected, actual } => format!(
                "Manifest size mismatch: expected {}, got {}",
                expected, actual
            ),
            MultipleExecutables => "More than one executable entry".to_string(),
            Overflow => "Overflow".to_string(),
            PathTooLong(len) => format!("Path too long: {} bytes", len),
            TooManyEntries(count) => format!("Too many entries: {}", count),
            TooShort(len) => format!("Archive too short: {} bytes", len),
            TryFromInt(err) => format!("TryFromInt: {}", err),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Cast(e) => Some(e),
            Self::TryFromInt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PodCastError> for Error {
    fn from(err: PodCastError) -> Error {
        Error::Cast(err)
    }
}

impl From<core::num::TryFromIntError> for Error {
    fn from(err: core::num::TryFromIntError) -> Error {
        Error::TryFromInt(err)
    }
}
