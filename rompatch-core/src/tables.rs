use crate::image::Image;
use crate::{PatchError, Result};

/// A fixed region of the image reserved for a serialized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRegion {
    pub name: &'static str,
    pub base: u32,
    pub capacity: usize,
}

impl TableRegion {
    pub fn check(&self, used: usize) -> Result<()> {
        if used > self.capacity {
            return Err(PatchError::TableCapacity {
                table: self.name,
                used,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

/// A fixed-width record that can be embedded in a [`TableRegion`].
pub trait TableEntry {
    const SIZE: usize;

    fn encode(&self, out: &mut Vec<u8>);
}

pub fn serialize<E: TableEntry>(entries: &[E]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * E::SIZE);
    for entry in entries {
        entry.encode(&mut out);
    }
    out
}

/// Serialize `entries` into `region`. Returns the number of bytes written.
pub fn write_table<E: TableEntry>(image: &mut Image, region: &TableRegion, entries: &[E]) -> Result<usize> {
    let bytes = serialize(entries);
    region.check(bytes.len())?;
    image.write_bytes(region.base, &bytes)?;
    Ok(bytes.len())
}

/// Growable list of entries destined for a fixed region.
#[derive(Debug, Clone)]
pub struct TableBuilder<E> {
    region: TableRegion,
    entries: Vec<E>,
}

impl<E: TableEntry> TableBuilder<E> {
    pub fn new(region: TableRegion) -> Self {
        Self {
            region,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: E) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<E> {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.entries.len() * E::SIZE
    }

    /// Close the table, failing if it no longer fits its region.
    pub fn finish(self) -> Result<Vec<E>> {
        self.region.check(self.byte_len())?;
        Ok(self.entries)
    }
}
