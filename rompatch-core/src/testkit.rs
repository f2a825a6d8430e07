//! Builders for synthetic scene/room data inside a blank image.

use crate::header::{CMD_END, RECORD_SIZE};
use crate::image::Image;
use crate::scene::SceneTable;

/// Start of the area synthetic records are allocated from.
const SCRATCH_START: u32 = 0x0100_0000;

/// Segment id used for every pointer written into a header.
const TEST_SEGMENT: u32 = 0x0200_0000;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Cmd {
    pub opcode: u8,
    pub count: u8,
    pub data: u32,
}

impl Cmd {
    pub fn new(opcode: u8, count: u8, data: u32) -> Self {
        Self {
            opcode,
            count,
            data,
        }
    }
}

/// Segment-tagged pointer to `target` relative to `base`.
pub(crate) fn seg(base: u32, target: u32) -> u32 {
    assert!(target >= base && target - base <= 0x00FF_FFFF);
    TEST_SEGMENT | (target - base)
}

pub(crate) struct ImageKit {
    pub image: Image,
    cursor: u32,
}

impl ImageKit {
    pub fn new() -> Self {
        Self {
            image: Image::blank(),
            cursor: SCRATCH_START,
        }
    }

    pub fn scratch_start(&self) -> u32 {
        SCRATCH_START
    }

    /// Reserve `len` bytes, 16-byte aligned.
    pub fn alloc(&mut self, len: u32) -> u32 {
        let address = self.cursor;
        self.cursor += (len + 15) & !15;
        address
    }

    /// Reserve room for `records` header records, terminator included.
    pub fn reserve_header(&mut self, records: u32) -> u32 {
        self.alloc(records * RECORD_SIZE)
    }

    /// Write `commands` followed by the end command.
    pub fn write_header(&mut self, at: u32, commands: &[Cmd]) {
        let mut address = at;
        for cmd in commands {
            self.image.write_u8(address, cmd.opcode).unwrap();
            self.image.write_u8(address + 1, cmd.count).unwrap();
            self.image.write_u32(address + 4, cmd.data).unwrap();
            address += RECORD_SIZE;
        }
        self.image.write_u8(address, CMD_END).unwrap();
    }

    /// Lay out actor records `(actor id, variable)`; returns the list address.
    pub fn actors(&mut self, actors: &[(u16, u16)]) -> u32 {
        let list = self.alloc(actors.len() as u32 * 16);
        for (i, &(id, variable)) in actors.iter().enumerate() {
            let record = list + i as u32 * 16;
            self.image.write_u16(record, id).unwrap();
            self.image.write_u16(record + 14, variable).unwrap();
        }
        list
    }

    /// Lay out 8-byte room records holding absolute header addresses.
    pub fn room_list(&mut self, rooms: &[u32]) -> u32 {
        let list = self.alloc(rooms.len() as u32 * 8);
        for (i, &room) in rooms.iter().enumerate() {
            self.image.write_u32(list + i as u32 * 8, room).unwrap();
        }
        list
    }

    /// Lay out an alternate header list; each slot is a raw pointer.
    pub fn alternate_list(&mut self, slots: &[u32]) -> u32 {
        let list = self.alloc(slots.len() as u32 * 4);
        for (i, &slot) in slots.iter().enumerate() {
            self.image.write_u32(list + i as u32 * 4, slot).unwrap();
        }
        list
    }

    /// A room header holding a single actor list.
    pub fn room_with_actors(&mut self, actors: &[(u16, u16)]) -> u32 {
        let room = self.reserve_header(2);
        let list = self.actors(actors);
        self.write_header(
            room,
            &[Cmd::new(
                crate::header::CMD_ACTOR_LIST,
                actors.len() as u8,
                seg(room, list),
            )],
        );
        room
    }

    /// A scene header holding a single room list.
    pub fn scene_with_rooms(&mut self, rooms: &[u32]) -> u32 {
        let scene = self.reserve_header(2);
        let list = self.room_list(rooms);
        self.write_header(
            scene,
            &[Cmd::new(
                crate::header::CMD_ROOM_LIST,
                rooms.len() as u8,
                seg(scene, list),
            )],
        );
        scene
    }

    pub fn set_scene(&mut self, table: &SceneTable, scene: u8, header: u32) {
        self.image
            .write_u32(table.entry_address(scene), header)
            .unwrap();
    }
}
