//! The packed structs represent the on-disk format of dir2exe
use bytemuck::{Pod, Zeroable};

use crate::{Error, MAGIC};

/// Trailer occupying the last bytes of every archive
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(packed, C)]
pub struct Footer {
    /// Absolute offset of the manifest, little-endian
    pub manifest_offset: u64,
    /// NUL-terminated signature, see [`MAGIC`]
    pub magic: [u8; 8],
}

impl Footer {
    pub fn new(manifest_offset: u64) -> Footer {
        Footer {
            manifest_offset: manifest_offset.to_le(),
            magic: MAGIC,
        }
    }

    /// Parse a footer from raw trailer data and check the signature
    pub fn parse(data: &[u8]) -> Result<Footer, Error> {
        let footer: Footer = *bytemuck::try_from_bytes(data)?;
        if footer.magic != MAGIC {
            return Err(Error::InvalidMagic);
        }
        Ok(footer)
    }

    pub fn manifest_offset(&self) -> u64 {
        u64::from_le(self.manifest_offset)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
