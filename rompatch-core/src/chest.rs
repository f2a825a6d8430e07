use log::{debug, info};

use crate::header::HeaderWalker;
use crate::image::Image;
use crate::items::{ChestSize, ItemAnimationTable};
use crate::overrides::{OverrideTable, OverrideType};
use crate::scene::{get_chest_list, SceneTable};
use crate::{PatchError, Result};

pub const CHEST_TYPE_MASK: u16 = 0xF000;
pub const CHEST_FLAGS_MASK: u16 = 0x0FFF;

/// Replacement type code for each current type code, indexed by
/// `type_code >> 12` and then by [`ChestSize`].
pub const CHEST_TYPE_MAP: [[u16; 3]; 16] = [
    //  small   big     boss
    [0x5000, 0x0000, 0x2000], // 0x0000 large
    [0x7000, 0x1000, 0x1000], // 0x1000 large, appears, clear flag
    [0x5000, 0x0000, 0x2000], // 0x2000 boss key
    [0x8000, 0x3000, 0x3000], // 0x3000 large, falling, switch flag
    [0x6000, 0x4000, 0x4000], // 0x4000 large, invisible
    [0x5000, 0x0000, 0x2000], // 0x5000 small
    [0x6000, 0x4000, 0x4000], // 0x6000 small, invisible
    [0x7000, 0x1000, 0x1000], // 0x7000 small, appears, clear flag
    [0x8000, 0x3000, 0x3000], // 0x8000 small, falling, switch flag
    [0x9000, 0x9000, 0x9000], // 0x9000 large, appears, lullaby
    [0xA000, 0xA000, 0xA000], // 0xA000 large, appears, sun's song
    [0xB000, 0xB000, 0xB000], // 0xB000 large, appears, switch flag
    [0x5000, 0x0000, 0x2000], // 0xC000 large
    [0x5000, 0x0000, 0x2000], // 0xD000 large
    [0x5000, 0x0000, 0x2000], // 0xE000 large
    [0x5000, 0x0000, 0x2000], // 0xF000 large
];

/// Type code a chest of `type_code` becomes when holding a `size` item.
pub fn chest_type_for(type_code: u16, size: ChestSize) -> Result<u16> {
    if type_code & CHEST_FLAGS_MASK != 0 {
        return Err(PatchError::UnknownTypeCode(type_code));
    }
    CHEST_TYPE_MAP
        .get(usize::from(type_code >> 12))
        .map(|row| row[size.index()])
        .ok_or(PatchError::UnknownTypeCode(type_code))
}

/// Swap the type nibble of a chest's packed value, keeping its flag bits.
pub fn repack_chest_default(default: u16, size: ChestSize) -> Result<u16> {
    let new_type = chest_type_for(default & CHEST_TYPE_MASK, size)?;
    Ok((default & CHEST_FLAGS_MASK) | (new_type & CHEST_TYPE_MASK))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestRewrite {
    pub address: u32,
    pub scene: u8,
    pub flag: u8,
    pub item_id: u8,
    pub size: ChestSize,
    pub old: u16,
    pub new: u16,
}

impl ChestRewrite {
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChestSizeReport {
    pub chests_found: usize,
    pub rewrites: Vec<ChestRewrite>,
}

/// Makes every randomized chest look like the item it now holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChestSizePatcher {
    pub scenes: SceneTable,
    pub walker: HeaderWalker,
    pub items: ItemAnimationTable,
}

impl ChestSizePatcher {
    pub fn update_chest_sizes(
        &self,
        image: &mut Image,
        overrides: &OverrideTable,
    ) -> Result<ChestSizeReport> {
        let chests = get_chest_list(image, &self.scenes, self.walker)?;
        let mut report = ChestSizeReport {
            chests_found: chests.len(),
            rewrites: Vec::new(),
        };

        for (&address, chest) in &chests {
            let Some(item_id) = overrides.resolve(chest.scene, OverrideType::Chest, chest.flag)
            else {
                continue;
            };

            let size = self.items.classify(image, item_id)?;
            let old = image.read_u16(address)?;
            let new = repack_chest_default(old, size)?;
            image.write_u16(address, new)?;

            debug!(
                "chest 0x{address:08X} scene {} flag 0x{:02X}: item 0x{item_id:02X} {size:?}, 0x{old:04X} -> 0x{new:04X}",
                chest.scene, chest.flag
            );
            report.rewrites.push(ChestRewrite {
                address,
                scene: chest.scene,
                flag: chest.flag,
                item_id,
                size,
                old,
                new,
            });
        }

        info!(
            "chest sizes: {} chests found, {} randomized, {} changed",
            report.chests_found,
            report.rewrites.len(),
            report.rewrites.iter().filter(|r| r.changed()).count()
        );
        Ok(report)
    }
}
