use std::collections::BTreeSet;

use log::debug;

use crate::image::Image;
use crate::placement::{Location, LocationKind};
use crate::tables::{serialize, write_table, TableBuilder, TableEntry, TableRegion};
use crate::{PatchError, Result};

pub const OVERRIDE_TABLE: TableRegion = TableRegion {
    name: "override table",
    base: 0x0348_1000,
    capacity: 0x800,
};

pub const PLAYER_ID_ADDRESS: u32 = 0x0348_1C00;

/// Low bits of the packed type byte hold the category; the rest is owner.
pub const OVERRIDE_TYPE_MASK: u8 = 0x07;

const CHEST_FLAG_MASK: u16 = 0x001F;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum OverrideType {
    Npc = 0,
    Chest = 1,
    Collectable = 2,
    GoldSkulltula = 3,
}

impl OverrideType {
    pub fn for_kind(kind: LocationKind) -> Option<Self> {
        match kind {
            LocationKind::Npc | LocationKind::BossHeart => Some(Self::Npc),
            LocationKind::Chest => Some(Self::Chest),
            LocationKind::Collectable => Some(Self::Collectable),
            LocationKind::GsToken => Some(Self::GoldSkulltula),
            LocationKind::Other => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Flag stored for a location of this type with the given default.
    pub fn flag_from_default(self, default: u16) -> Result<u8> {
        match self {
            Self::Chest => Ok((default & CHEST_FLAG_MASK) as u8),
            _ => u8::try_from(default).map_err(|_| PatchError::FieldRange {
                field: "override flag",
                value: u32::from(default),
            }),
        }
    }
}

fn owner_bits(world_id: u8) -> Result<u8> {
    world_id
        .checked_add(1)
        .and_then(|player| player.checked_mul(8))
        .ok_or(PatchError::FieldRange {
            field: "world id",
            value: u32::from(world_id),
        })
}

/// One 4-byte record: `[scene, owner | type, flag, item]`.
///
/// Field order matches the on-image layout so the derived ordering is the
/// order entries are embedded in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OverrideEntry {
    pub scene: u8,
    pub packed_type: u8,
    pub flag: u8,
    pub item_id: u8,
}

impl OverrideEntry {
    /// Build the entry for `location`, or `None` when the location is not
    /// fully placed or is not of an overridable kind.
    pub fn from_location(location: &Location) -> Result<Option<Self>> {
        let (Some(scene), Some(default), Some(item)) =
            (location.scene, location.default, location.item.as_ref())
        else {
            return Ok(None);
        };
        let Some(item_id) = item.index else {
            return Ok(None);
        };
        let Some(kind) = OverrideType::for_kind(location.kind) else {
            return Ok(None);
        };

        Ok(Some(Self {
            scene,
            packed_type: owner_bits(item.world_id)? | kind.tag(),
            flag: kind.flag_from_default(default)?,
            item_id,
        }))
    }

    pub fn override_type(&self) -> u8 {
        self.packed_type & OVERRIDE_TYPE_MASK
    }

    /// What the game looks an entry up by: owner bits are not part of it.
    pub fn key(&self) -> (u8, u8, u8) {
        (self.scene, self.override_type(), self.flag)
    }

    pub fn matches(&self, scene: u8, kind: OverrideType, flag: u8) -> bool {
        self.scene == scene && self.override_type() == kind.tag() && self.flag == flag
    }
}

impl TableEntry for OverrideEntry {
    const SIZE: usize = 4;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.scene, self.packed_type, self.flag, self.item_id]);
    }
}

/// Collects override entries for every placed location.
#[derive(Debug, Clone)]
pub struct OverrideTableBuilder {
    table: TableBuilder<OverrideEntry>,
}

impl Default for OverrideTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OverrideTableBuilder {
    pub fn new() -> Self {
        Self {
            table: TableBuilder::new(OVERRIDE_TABLE),
        }
    }

    /// Append the entry for `location`; returns whether one was produced.
    pub fn push_location(&mut self, location: &Location) -> Result<bool> {
        match OverrideEntry::from_location(location)? {
            Some(entry) => {
                debug!(
                    "override {:?}: scene {} type 0x{:02X} flag 0x{:02X} -> item 0x{:02X}",
                    location.name, entry.scene, entry.packed_type, entry.flag, entry.item_id
                );
                self.table.push(entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn extend<'a, I>(&mut self, locations: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Location>,
    {
        for location in locations {
            self.push_location(location)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Sort the entries and check they fit the embedded region. Two entries
    /// sharing a lookup key are rejected.
    pub fn finish(mut self) -> Result<OverrideTable> {
        self.table.entries_mut().sort();

        let mut seen = BTreeSet::new();
        for entry in self.table.entries() {
            if !seen.insert(entry.key()) {
                return Err(PatchError::Config(format!(
                    "duplicate override for scene {} type {} flag 0x{:02X}",
                    entry.scene,
                    entry.override_type(),
                    entry.flag
                )));
            }
        }

        Ok(OverrideTable {
            entries: self.table.finish()?,
        })
    }
}

/// The finished, sorted override table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    entries: Vec<OverrideEntry>,
}

impl OverrideTable {
    pub fn from_locations<'a, I>(locations: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Location>,
    {
        let mut builder = OverrideTableBuilder::new();
        builder.extend(locations)?;
        builder.finish()
    }

    pub fn entries(&self) -> &[OverrideEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Item assigned to `(scene, kind, flag)`, if the location was placed.
    pub fn resolve(&self, scene: u8, kind: OverrideType, flag: u8) -> Option<u8> {
        self.entries
            .iter()
            .find(|entry| entry.matches(scene, kind, flag))
            .map(|entry| entry.item_id)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serialize(&self.entries)
    }

    /// Embed the table and the owning player's id. Returns bytes written.
    pub fn write(&self, image: &mut Image, world_id: u8) -> Result<usize> {
        let written = write_table(image, &OVERRIDE_TABLE, &self.entries)?;
        image.write_u8(PLAYER_ID_ADDRESS, owner_bits(world_id)? >> 3)?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::PlacedItem;

    fn location(kind: LocationKind, scene: u8, default: u16, item: u8) -> Location {
        Location {
            name: format!("{kind:?} {scene}/{default:#X}"),
            kind,
            scene: Some(scene),
            default: Some(default),
            item: Some(PlacedItem {
                index: Some(item),
                world_id: 0,
            }),
        }
    }

    #[test]
    fn encodes_each_location_kind() {
        let cases = [
            (LocationKind::Npc, 0x52, 0x52u8),
            (LocationKind::BossHeart, 0x4F, 0x4F),
            (LocationKind::Chest, 0x5AA7, 0x07),
            (LocationKind::Collectable, 0x06, 0x06),
            (LocationKind::GsToken, 0x02, 0x02),
        ];
        let expected_types = [0x08, 0x08, 0x09, 0x0A, 0x0B];

        for ((kind, default, flag), packed_type) in cases.into_iter().zip(expected_types) {
            let entry = OverrideEntry::from_location(&location(kind, 3, default, 0x42))
                .unwrap()
                .unwrap();
            assert_eq!(
                entry,
                OverrideEntry {
                    scene: 3,
                    packed_type,
                    flag,
                    item_id: 0x42,
                }
            );
        }
    }

    #[test]
    fn incomplete_or_unknown_locations_are_skipped() {
        let mut missing_scene = location(LocationKind::Chest, 0, 1, 1);
        missing_scene.scene = None;
        let mut missing_default = location(LocationKind::Chest, 0, 1, 1);
        missing_default.default = None;
        let mut missing_item = location(LocationKind::Chest, 0, 1, 1);
        missing_item.item = None;
        let mut missing_index = location(LocationKind::Chest, 0, 1, 1);
        missing_index.item = Some(PlacedItem {
            index: None,
            world_id: 0,
        });
        let other = location(LocationKind::Other, 0, 1, 1);

        let mut builder = OverrideTableBuilder::new();
        for loc in [&missing_scene, &missing_default, &missing_item, &missing_index, &other] {
            assert!(!builder.push_location(loc).unwrap());
        }
        assert!(builder.finish().unwrap().is_empty());
    }

    #[test]
    fn owner_bits_follow_item_world() {
        let mut loc = location(LocationKind::Chest, 1, 2, 3);
        loc.item.as_mut().unwrap().world_id = 2;
        let entry = OverrideEntry::from_location(&loc).unwrap().unwrap();
        assert_eq!(entry.packed_type, (3 << 3) | 1);
        assert_eq!(entry.override_type(), OverrideType::Chest.tag());

        loc.item.as_mut().unwrap().world_id = 31;
        assert!(matches!(
            OverrideEntry::from_location(&loc),
            Err(PatchError::FieldRange { field: "world id", .. })
        ));
    }

    #[test]
    fn wide_npc_default_is_rejected() {
        let loc = location(LocationKind::Npc, 1, 0x1FF, 3);
        assert!(matches!(
            OverrideEntry::from_location(&loc),
            Err(PatchError::FieldRange { value: 0x1FF, .. })
        ));
    }

    #[test]
    fn entries_are_sorted_regardless_of_input_order() {
        let locations = vec![
            location(LocationKind::Chest, 9, 1, 0x10),
            location(LocationKind::Npc, 2, 5, 0x11),
            location(LocationKind::Chest, 2, 3, 0x12),
            location(LocationKind::GsToken, 2, 1, 0x13),
        ];
        let mut reversed = locations.clone();
        reversed.reverse();

        let forward = OverrideTable::from_locations(&locations).unwrap();
        let backward = OverrideTable::from_locations(&reversed).unwrap();
        assert_eq!(forward.to_bytes(), backward.to_bytes());
        assert_eq!(
            forward.to_bytes(),
            vec![
                2, 0x08, 5, 0x11, //
                2, 0x09, 3, 0x12, //
                2, 0x0B, 1, 0x13, //
                9, 0x09, 1, 0x10,
            ]
        );
    }

    #[test]
    fn resolves_every_built_location() {
        let locations: Vec<Location> = (0u8..40)
            .map(|i| {
                let kind = match i % 4 {
                    0 => LocationKind::Npc,
                    1 => LocationKind::Chest,
                    2 => LocationKind::Collectable,
                    _ => LocationKind::GsToken,
                };
                location(kind, i / 3, u16::from(i) | 0x40, i.wrapping_mul(7))
            })
            .collect();

        let table = OverrideTable::from_locations(&locations).unwrap();
        for loc in &locations {
            let kind = OverrideType::for_kind(loc.kind).unwrap();
            let flag = kind.flag_from_default(loc.default.unwrap()).unwrap();
            assert_eq!(
                table.resolve(loc.scene.unwrap(), kind, flag),
                loc.item_index(),
                "{}",
                loc.name
            );
        }
        assert_eq!(table.resolve(0, OverrideType::Chest, 0x1E), None);
    }

    #[test]
    fn colliding_lookup_keys_are_rejected() {
        // 0x21 and 0x01 mask to the same chest flag; owners differ.
        let mut big = location(LocationKind::Chest, 4, 0x21, 0x90);
        big.item.as_mut().unwrap().world_id = 1;
        let small = location(LocationKind::Chest, 4, 0x01, 0x10);

        let err = OverrideTable::from_locations(&[big, small]).unwrap_err();
        assert!(matches!(err, PatchError::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: duplicate override for scene 4 type 1 flag 0x01"
        );

        let npc = location(LocationKind::Npc, 4, 0x01, 0x10);
        let chest = location(LocationKind::Chest, 4, 0x01, 0x90);
        let table = OverrideTable::from_locations(&[npc, chest]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve(4, OverrideType::Chest, 0x01), Some(0x90));
        assert_eq!(table.resolve(4, OverrideType::Npc, 0x01), Some(0x10));
    }

    #[test]
    fn capacity_overflow_reports_sizes() {
        let locations: Vec<Location> = (0..=512u16)
            .map(|i| location(LocationKind::Collectable, (i / 256) as u8, i % 256, 1))
            .collect();

        let err = OverrideTable::from_locations(&locations).unwrap_err();
        assert!(matches!(
            err,
            PatchError::TableCapacity { used: 2052, capacity: 0x800, .. }
        ));
        assert!(err.to_string().contains("2052"));
    }

    #[test]
    fn write_embeds_table_and_player_id() {
        let table =
            OverrideTable::from_locations(&[location(LocationKind::Chest, 0, 0x07, 0x42)]).unwrap();
        let mut image = Image::blank();
        assert_eq!(table.write(&mut image, 0).unwrap(), 4);
        assert_eq!(
            image.read_bytes(OVERRIDE_TABLE.base, 4).unwrap(),
            &[0x00, 0x09, 0x07, 0x42]
        );
        assert_eq!(image.read_u8(PLAYER_ID_ADDRESS).unwrap(), 1);
    }
}
