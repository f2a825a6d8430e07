use serde::{Deserialize, Serialize};

use crate::image::Image;
use crate::tables::{write_table, TableBuilder, TableEntry, TableRegion};
use crate::{PatchError, Result};

pub const INITIAL_SAVE_TABLE: TableRegion = TableRegion {
    name: "initial save table",
    base: 0x0348_1800,
    capacity: 0x400,
};

/// A change to the initial save file requested by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveWrite {
    /// OR `value` into the save byte at `offset`.
    Bits { offset: u16, value: u8 },
    /// Overwrite the save byte at `offset`.
    Byte { offset: u16, value: u8 },
    /// Overwrite consecutive save bytes starting at `offset`. With
    /// `skip_zero`, zero values leave their byte untouched.
    Bytes {
        offset: u16,
        values: Vec<u8>,
        #[serde(default)]
        skip_zero: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum SaveOp {
    SetBits = 0,
    SetByte = 1,
}

/// `[offset_hi, offset_lo, op, value]`
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SaveEntry {
    pub offset: u16,
    pub op: SaveOp,
    pub value: u8,
}

impl TableEntry for SaveEntry {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        let [hi, lo] = self.offset.to_be_bytes();
        out.extend_from_slice(&[hi, lo, self.op as u8, self.value]);
    }
}

/// Writes applied to the save file when a new game is started, in the
/// order they were requested.
#[derive(Debug, Clone)]
pub struct InitialSaveTable {
    table: TableBuilder<SaveEntry>,
}

impl Default for InitialSaveTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InitialSaveTable {
    pub fn new() -> Self {
        Self {
            table: TableBuilder::new(INITIAL_SAVE_TABLE),
        }
    }

    pub fn write_bits(&mut self, offset: u16, value: u8) {
        self.table.push(SaveEntry {
            offset,
            op: SaveOp::SetBits,
            value,
        });
    }

    pub fn write_byte(&mut self, offset: u16, value: u8) {
        self.table.push(SaveEntry {
            offset,
            op: SaveOp::SetByte,
            value,
        });
    }

    pub fn write_bytes(&mut self, offset: u16, values: &[u8]) -> Result<()> {
        self.write_bytes_where(offset, values, |_| true)
    }

    /// Like [`write_bytes`](Self::write_bytes), but only values accepted by
    /// `keep` produce entries. Offsets still advance past skipped values.
    pub fn write_bytes_where<F>(&mut self, offset: u16, values: &[u8], keep: F) -> Result<()>
    where
        F: Fn(u8) -> bool,
    {
        for (i, &value) in values.iter().enumerate() {
            let at = u16::try_from(i)
                .ok()
                .and_then(|i| offset.checked_add(i))
                .ok_or(PatchError::FieldRange {
                    field: "save offset",
                    value: u32::from(offset) + i as u32,
                })?;
            if keep(value) {
                self.write_byte(at, value);
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, write: &SaveWrite) -> Result<()> {
        match write {
            SaveWrite::Bits { offset, value } => self.write_bits(*offset, *value),
            SaveWrite::Byte { offset, value } => self.write_byte(*offset, *value),
            SaveWrite::Bytes {
                offset,
                values,
                skip_zero,
            } => {
                let skip_zero = *skip_zero;
                self.write_bytes_where(*offset, values, |v| !skip_zero || v != 0)?
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[SaveEntry] {
        self.table.entries()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check capacity and embed the table. Returns the number of entries.
    pub fn write(self, image: &mut Image) -> Result<usize> {
        let entries = self.table.finish()?;
        write_table(image, &INITIAL_SAVE_TABLE, &entries)?;
        Ok(entries.len())
    }
}
