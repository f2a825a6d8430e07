use crate::image::Image;
use crate::Result;

/// Item ids at or above this are randomizer additions with no entry in the
/// game's own item table.
pub const EXTENDED_ITEM_THRESHOLD: u8 = 0x80;

/// Extended items that open with the short animation.
pub const FAST_CHEST_ANIMATION_ITEMS: &[u8] = &[
    0x87, // Progressive Nut Capacity
    0x88, // Progressive Stick Capacity
    0xB6, // Recovery Heart
    0xB7, // Arrows (5)
    0xB8, // Arrows (10)
    0xB9, // Arrows (30)
    0xBA, // Bombs (5)
    0xBB, // Bombs (10)
    0xBC, // Bombs (20)
    0xBD, // Deku Nuts (5)
    0xBE, // Deku Nuts (10)
];

/// Animation bytes rewritten before chests are sized, so these items land
/// in the chest size they are meant to.
pub const CHEST_ANIMATION_FIXES: &[(u8, u8)] = &[
    (0x3D, 0xED), // Heart Container
    (0x3E, 0xEC), // Piece of Heart
    (0x42, 0x02), // Small Key
    (0x48, 0xF7), // Recovery Heart
    (0x4F, 0xED), // Heart Container
];

pub const ITEM_TABLE_BASE: u32 = 0x00BE_EE8E;
pub const ITEM_TABLE_STRIDE: u32 = 6;
pub const ITEM_ANIMATION_OFFSET: u32 = 2;
pub const NO_ANIMATION_BIT: u8 = 0x80;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChestSize {
    Small = 0,
    Big = 1,
    Boss = 2,
}

impl ChestSize {
    pub const ALL: [ChestSize; 3] = [ChestSize::Small, ChestSize::Big, ChestSize::Boss];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// The game's per-item get-item records, used to tell whether an item
/// plays the long reveal animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAnimationTable {
    pub base: u32,
    pub stride: u32,
    pub flag_offset: u32,
}

impl Default for ItemAnimationTable {
    fn default() -> Self {
        Self {
            base: ITEM_TABLE_BASE,
            stride: ITEM_TABLE_STRIDE,
            flag_offset: ITEM_ANIMATION_OFFSET,
        }
    }
}

impl ItemAnimationTable {
    pub fn flag_address(&self, item_id: u8) -> u32 {
        self.base
            .saturating_add(u32::from(item_id) * self.stride)
            .saturating_add(self.flag_offset)
    }

    pub fn has_reveal_animation(&self, image: &Image, item_id: u8) -> Result<bool> {
        Ok(image.read_u8(self.flag_address(item_id))? & NO_ANIMATION_BIT == 0)
    }

    /// Write [`CHEST_ANIMATION_FIXES`] into the table.
    pub fn apply_chest_animation_fixes(&self, image: &mut Image) -> Result<()> {
        for &(item_id, animation) in CHEST_ANIMATION_FIXES {
            image.write_u8(self.flag_address(item_id), animation)?;
        }
        Ok(())
    }

    /// Size of chest `item_id` should be presented in. Never `Boss`.
    pub fn classify(&self, image: &Image, item_id: u8) -> Result<ChestSize> {
        if item_id >= EXTENDED_ITEM_THRESHOLD {
            return Ok(if FAST_CHEST_ANIMATION_ITEMS.contains(&item_id) {
                ChestSize::Small
            } else {
                ChestSize::Big
            });
        }

        Ok(if self.has_reveal_animation(image, item_id)? {
            ChestSize::Big
        } else {
            ChestSize::Small
        })
    }
}
