use crate::{PatchError, Result};

/// Size every working image is extended to before patching.
pub const IMAGE_SIZE: usize = 0x0400_0000;

/// Smallest image accepted from disk (a compressed cartridge dump).
const MIN_ROM_SIZE: usize = 0x0200_0000;

const SIGNATURE_RANGE: std::ops::Range<usize> = 0x10..0x18;

const SIGNATURE_DECOMPRESSED: [u8; 8] = [0x93, 0x52, 0x2E, 0x7B, 0xE5, 0x06, 0xD4, 0x27];
const SIGNATURE_COMPRESSED: [u8; 8] = [0xEC, 0x70, 0x11, 0xB7, 0x76, 0x16, 0xD7, 0x2B];
const SIGNATURE_BYTESWAPPED: [u8; 8] = [0x70, 0xEC, 0xB7, 0x11, 0x16, 0x76, 0x2B, 0xD7];

/// Flat, fixed-size game image with big-endian accessors.
///
/// Every access is bounds-checked against the buffer; a read or write that
/// would run past the end fails with [`PatchError::OutOfBounds`] and leaves
/// the buffer untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image").field("len", &self.data.len()).finish()
    }
}

impl Image {
    /// A zero-filled image of [`IMAGE_SIZE`] bytes.
    pub fn blank() -> Self {
        Self {
            data: vec![0u8; IMAGE_SIZE],
        }
    }

    /// Validate a decompressed dump and extend it to [`IMAGE_SIZE`].
    pub fn from_rom_bytes(mut data: Vec<u8>) -> Result<Self> {
        if data.len() < SIGNATURE_RANGE.end {
            return Err(PatchError::InvalidRom(format!(
                "image is only {} bytes long",
                data.len()
            )));
        }

        let signature = &data[SIGNATURE_RANGE];
        if signature == SIGNATURE_COMPRESSED || signature == SIGNATURE_BYTESWAPPED {
            return Err(PatchError::InvalidRom(
                "image is compressed; supply a decompressed image".to_string(),
            ));
        }
        if signature != SIGNATURE_DECOMPRESSED {
            return Err(PatchError::InvalidRom(
                "image signature does not match a supported version".to_string(),
            ));
        }

        if data.len() < MIN_ROM_SIZE || data.len() > IMAGE_SIZE {
            return Err(PatchError::InvalidRom(format!(
                "image has unexpected length 0x{:X} bytes",
                data.len()
            )));
        }

        data.resize(IMAGE_SIZE, 0);
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn span(&self, address: u32, width: usize) -> Result<std::ops::Range<usize>> {
        let start = address as usize;
        match start.checked_add(width) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(PatchError::OutOfBounds {
                address,
                width,
                len: self.data.len(),
            }),
        }
    }

    pub fn read_bytes(&self, address: u32, len: usize) -> Result<&[u8]> {
        let span = self.span(address, len)?;
        Ok(&self.data[span])
    }

    pub fn write_bytes(&mut self, address: u32, values: &[u8]) -> Result<()> {
        let span = self.span(address, values.len())?;
        self.data[span].copy_from_slice(values);
        Ok(())
    }

    pub fn read_u8(&self, address: u32) -> Result<u8> {
        Ok(self.read_bytes(address, 1)?[0])
    }

    pub fn read_u16(&self, address: u32) -> Result<u16> {
        let b = self.read_bytes(address, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&self, address: u32) -> Result<u32> {
        let b = self.read_bytes(address, 3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&self, address: u32) -> Result<u32> {
        let b = self.read_bytes(address, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_u8(&mut self, address: u32, value: u8) -> Result<()> {
        self.write_bytes(address, &[value])
    }

    pub fn write_u16(&mut self, address: u32, value: u16) -> Result<()> {
        self.write_bytes(address, &value.to_be_bytes())
    }

    /// Writes the low 24 bits of `value`.
    pub fn write_u24(&mut self, address: u32, value: u32) -> Result<()> {
        let bytes = value.to_be_bytes();
        self.write_bytes(address, &bytes[1..])
    }

    pub fn write_u32(&mut self, address: u32, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_be_bytes())
    }
}
