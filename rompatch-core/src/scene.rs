use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::{debug, warn};

use crate::header::{
    resolve_pointer, HeaderCommand, HeaderWalker, CMD_ACTOR_LIST, CMD_ALTERNATE_HEADERS,
    CMD_ROOM_LIST,
};
use crate::image::Image;
use crate::Result;

pub const SCENE_TABLE_BASE: u32 = 0x00B7_1440;
pub const SCENE_TABLE_STRIDE: u32 = 0x14;
pub const SCENE_COUNT: u8 = 0x65;

pub const CHEST_ACTOR_ID: u16 = 0x000A;
pub const CHEST_FLAG_MASK: u16 = 0x001F;

const ROOM_RECORD_SIZE: u32 = 8;
const ACTOR_RECORD_SIZE: u32 = 16;
const ACTOR_VARIABLE_OFFSET: u32 = 14;

/// Byte offsets of the alternate header slots that are followed.
const ALTERNATE_HEADER_SLOTS: [u32; 2] = [4, 8];

/// Scenes whose headers carry alternate setups worth following.
pub const ALTERNATE_HEADER_SCENES: RangeInclusive<u8> = 81..=99;

/// Location and size of the scene table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTable {
    pub base: u32,
    pub count: u8,
}

impl Default for SceneTable {
    fn default() -> Self {
        Self {
            base: SCENE_TABLE_BASE,
            count: SCENE_COUNT,
        }
    }
}

impl SceneTable {
    pub fn entry_address(&self, scene: u8) -> u32 {
        self.base.saturating_add(u32::from(scene) * SCENE_TABLE_STRIDE)
    }

    /// Absolute address of the scene's header stream; 0 when unused.
    pub fn header_pointer(&self, image: &Image, scene: u8) -> Result<u32> {
        image.read_u32(self.entry_address(scene))
    }
}

/// A chest actor found in the image, keyed elsewhere by the address of its
/// variable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChestInstance {
    pub scene: u8,
    pub flag: u8,
}

pub type ChestList = BTreeMap<u32, ChestInstance>;

/// Whether a header was reached directly or through an alternate list.
/// Alternate headers never have their own alternates followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderDepth {
    Primary,
    Alternate,
}

fn follows_alternates(scene: u8, depth: HeaderDepth) -> bool {
    depth == HeaderDepth::Primary && ALTERNATE_HEADER_SCENES.contains(&scene)
}

struct ChestCollector<'a> {
    image: &'a Image,
    walker: HeaderWalker,
    chests: ChestList,
}

impl<'a> ChestCollector<'a> {
    fn alternate_headers(&self, cmd: &HeaderCommand, base: u32) -> Result<Vec<u32>> {
        let list = cmd.pointer(base);
        let mut headers = Vec::with_capacity(ALTERNATE_HEADER_SLOTS.len());
        for slot in ALTERNATE_HEADER_SLOTS {
            let raw = self.image.read_u32(list.saturating_add(slot))?;
            if raw != 0 {
                headers.push(resolve_pointer(base, raw));
            }
        }
        Ok(headers)
    }

    fn walk_scene(&mut self, header: u32, base: u32, scene: u8, depth: HeaderDepth) -> Result<()> {
        let image = self.image;
        let mut commands = Vec::new();
        self.walker.walk(image, header, |cmd| {
            commands.push(cmd);
            Ok(())
        })?;

        for cmd in commands {
            match cmd.opcode {
                CMD_ROOM_LIST => {
                    let list = cmd.pointer(base);
                    for i in 0..u32::from(cmd.count) {
                        let room = image.read_u32(list.saturating_add(i * ROOM_RECORD_SIZE))?;
                        if room == 0 {
                            warn!("scene {scene}: room {i} has a null header pointer");
                            continue;
                        }
                        // Every room starts its own header chain.
                        self.walk_room(room, room, scene, HeaderDepth::Primary)?;
                    }
                }
                CMD_ALTERNATE_HEADERS if follows_alternates(scene, depth) => {
                    for alternate in self.alternate_headers(&cmd, base)? {
                        self.walk_scene(alternate, base, scene, HeaderDepth::Alternate)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn walk_room(&mut self, header: u32, base: u32, scene: u8, depth: HeaderDepth) -> Result<()> {
        let image = self.image;
        let mut commands = Vec::new();
        self.walker.walk(image, header, |cmd| {
            commands.push(cmd);
            Ok(())
        })?;

        for cmd in commands {
            match cmd.opcode {
                CMD_ACTOR_LIST => {
                    let list = cmd.pointer(base);
                    for i in 0..u32::from(cmd.count) {
                        let record = list.saturating_add(i * ACTOR_RECORD_SIZE);
                        if image.read_u16(record)? != CHEST_ACTOR_ID {
                            continue;
                        }
                        let address = record + ACTOR_VARIABLE_OFFSET;
                        let variable = image.read_u16(address)?;
                        let flag = (variable & CHEST_FLAG_MASK) as u8;
                        debug!("chest at 0x{address:08X}: scene {scene}, flag 0x{flag:02X}");
                        self.chests.insert(address, ChestInstance { scene, flag });
                    }
                }
                CMD_ALTERNATE_HEADERS if follows_alternates(scene, depth) => {
                    for alternate in self.alternate_headers(&cmd, base)? {
                        self.walk_room(alternate, base, scene, HeaderDepth::Alternate)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Walk every scene in `table` and collect the chest actors reachable from
/// its rooms, including those placed only in alternate setups.
pub fn get_chest_list(image: &Image, table: &SceneTable, walker: HeaderWalker) -> Result<ChestList> {
    let mut collector = ChestCollector {
        image,
        walker,
        chests: ChestList::new(),
    };

    for scene in 0..table.count {
        let header = table.header_pointer(image, scene)?;
        if header == 0 {
            continue;
        }
        collector.walk_scene(header, header, scene, HeaderDepth::Primary)?;
    }

    Ok(collector.chests)
}
