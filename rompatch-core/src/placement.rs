use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::save::SaveWrite;
use crate::Result;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LocationKind {
    #[serde(rename = "NPC")]
    Npc,
    BossHeart,
    Chest,
    Collectable,
    #[serde(rename = "GS Token")]
    GsToken,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedItem {
    #[serde(default)]
    pub index: Option<u8>,
    /// World the item belongs to; 0-based.
    #[serde(default)]
    pub world_id: u8,
}

/// A randomized location as decided by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub kind: LocationKind,
    #[serde(default)]
    pub scene: Option<u8>,
    #[serde(default)]
    pub default: Option<u16>,
    #[serde(default)]
    pub item: Option<PlacedItem>,
}

impl Location {
    pub fn item_index(&self) -> Option<u8> {
        self.item.as_ref().and_then(|item| item.index)
    }
}

/// Everything the solver hands over for one world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDocument {
    #[serde(default)]
    pub world_id: u8,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub initial_save: Vec<SaveWrite>,
}

impl PlacementDocument {
    pub fn from_json_str(src: &str) -> Result<Self> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
