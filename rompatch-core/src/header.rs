use crate::image::Image;
use crate::{PatchError, Result};

pub const CMD_ACTOR_LIST: u8 = 0x01;
pub const CMD_ROOM_LIST: u8 = 0x04;
pub const CMD_END: u8 = 0x14;
pub const CMD_ALTERNATE_HEADERS: u8 = 0x18;

pub const RECORD_SIZE: u32 = 8;

/// Segment-relative pointers keep their segment id in the top byte.
pub const SEGMENT_OFFSET_MASK: u32 = 0x00FF_FFFF;

pub const DEFAULT_MAX_RECORDS: usize = 256;

/// Turn a segment-tagged pointer into an absolute image address.
pub fn resolve_pointer(base: u32, raw: u32) -> u32 {
    base.saturating_add(raw & SEGMENT_OFFSET_MASK)
}

/// One 8-byte header record.
///
/// Layout: `[opcode, count, _, _, data: u32 be]`. Only the commands the
/// chest traversal cares about give `count`/`data` a meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCommand {
    pub address: u32,
    pub opcode: u8,
    pub count: u8,
    pub data: u32,
}

impl HeaderCommand {
    /// The record's data field resolved against `base`.
    pub fn pointer(&self, base: u32) -> u32 {
        resolve_pointer(base, self.data)
    }
}

/// Interpreter for scene and room header streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderWalker {
    /// Records read before a stream without a terminator is rejected.
    pub max_records: usize,
}

impl Default for HeaderWalker {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

impl HeaderWalker {
    pub fn with_max_records(max_records: usize) -> Self {
        Self { max_records }
    }

    /// Feed every record of the stream at `start` to `visit`, stopping at
    /// the end command. Returns the number of records read, terminator
    /// included.
    pub fn walk<F>(&self, image: &Image, start: u32, mut visit: F) -> Result<usize>
    where
        F: FnMut(HeaderCommand) -> Result<()>,
    {
        let mut address = start;

        for record in 0..self.max_records {
            let opcode = image.read_u8(address)?;
            if opcode == CMD_END {
                return Ok(record + 1);
            }

            visit(HeaderCommand {
                address,
                opcode,
                count: image.read_u8(address.saturating_add(1))?,
                data: image.read_u32(address.saturating_add(4))?,
            })?;

            address = address.saturating_add(RECORD_SIZE);
        }

        Err(PatchError::HeaderRunaway {
            address: start,
            records: self.max_records,
        })
    }
}
