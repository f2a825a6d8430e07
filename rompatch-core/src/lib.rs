use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

pub mod chest;
pub mod header;
pub mod image;
pub mod items;
pub mod overrides;
pub mod patches;
pub mod placement;
pub mod save;
pub mod scene;
pub mod tables;

#[cfg(test)]
mod testkit;

use chest::{ChestRewrite, ChestSizePatcher};
use image::Image;
use overrides::OverrideTable;
use patches::PatchSet;
use placement::PlacementDocument;
use save::InitialSaveTable;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub placements_path: PathBuf,
    #[serde(default)]
    pub patch_files: Vec<PathBuf>,
    #[serde(default = "default_true")]
    pub correct_chest_sizes: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid ROM: {0}")]
    InvalidRom(String),
    #[error("access of {width} bytes at 0x{address:08X} is outside the {len}-byte image")]
    OutOfBounds { address: u32, width: usize, len: usize },
    #[error("header at 0x{address:08X} has no end command within {records} records")]
    HeaderRunaway { address: u32, records: usize },
    #[error("{table} has exceeded its maximum capacity: {used} of {capacity} bytes")]
    TableCapacity {
        table: &'static str,
        used: usize,
        capacity: usize,
    },
    #[error("{field} value 0x{value:X} does not fit its field")]
    FieldRange { field: &'static str, value: u32 },
    #[error("no chest type mapping for type code 0x{0:04X}")]
    UnknownTypeCode(u16),
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// What a patching pass did to the image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub patch_bytes: usize,
    pub override_entries: usize,
    pub save_entries: usize,
    pub chests_found: usize,
    pub chest_rewrites: Vec<ChestRewrite>,
}

/// Apply patch sets, embed the override and initial save tables, rewrite
/// the chest animation bytes and optionally fix chest appearances, all in
/// memory.
pub fn patch_image(
    image: &mut Image,
    placements: &PlacementDocument,
    patch_sets: &[PatchSet],
    correct_chest_sizes: bool,
) -> Result<PatchSummary> {
    let mut summary = PatchSummary::default();

    for set in patch_sets {
        summary.patch_bytes += set.apply(image)?;
    }

    let overrides = OverrideTable::from_locations(&placements.locations)?;
    overrides.write(image, placements.world_id)?;
    summary.override_entries = overrides.len();

    let mut save_table = InitialSaveTable::new();
    for write in &placements.initial_save {
        save_table.apply(write)?;
    }
    summary.save_entries = save_table.write(image)?;

    let patcher = ChestSizePatcher::default();
    patcher.items.apply_chest_animation_fixes(image)?;

    if correct_chest_sizes {
        let report = patcher.update_chest_sizes(image, &overrides)?;
        summary.chests_found = report.chests_found;
        summary.chest_rewrites = report.rewrites;
    }

    info!(
        "patched image: {} override entries, {} save entries, {} chest rewrites",
        summary.override_entries,
        summary.save_entries,
        summary.chest_rewrites.len()
    );
    Ok(summary)
}

pub fn run(settings: PatchSettings) -> Result<()> {
    if !settings.input_path.exists() {
        return Err(PatchError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }
    if !settings.placements_path.exists() {
        return Err(PatchError::Config(format!(
            "Placements file does not exist: {}",
            settings.placements_path.display()
        )));
    }

    let mut image = Image::from_rom_bytes(fs::read(&settings.input_path)?)?;
    let placements = PlacementDocument::load(&settings.placements_path)?;
    let patch_sets = settings
        .patch_files
        .iter()
        .map(|path| PatchSet::load(path))
        .collect::<Result<Vec<_>>>()?;

    let summary = patch_image(
        &mut image,
        &placements,
        &patch_sets,
        settings.correct_chest_sizes,
    )?;

    if let Some(parent) = settings.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&settings.output_path, image.as_bytes())?;

    let mut log = format!("input: {}\n", settings.input_path.display());
    log.push_str(&format!("output: {}\n", settings.output_path.display()));
    log.push_str(&format!("placements: {}\n", settings.placements_path.display()));
    for path in &settings.patch_files {
        log.push_str(&format!("patch file: {}\n", path.display()));
    }
    log.push_str(&format!("patch bytes written: {}\n", summary.patch_bytes));
    log.push_str(&format!(
        "override entries: {} (world {})\n",
        summary.override_entries, placements.world_id
    ));
    log.push_str(&format!("initial save entries: {}\n", summary.save_entries));

    if settings.correct_chest_sizes {
        log.push_str(&format!(
            "chests found: {}, randomized: {}\n",
            summary.chests_found,
            summary.chest_rewrites.len()
        ));
        for rewrite in &summary.chest_rewrites {
            log.push_str(&format!(
                "  0x{:08X} scene={} flag=0x{:02X} item=0x{:02X} size={:?} 0x{:04X} -> 0x{:04X}\n",
                rewrite.address,
                rewrite.scene,
                rewrite.flag,
                rewrite.item_id,
                rewrite.size,
                rewrite.old,
                rewrite.new,
            ));
        }
    } else {
        log.push_str("chest sizes: not corrected (disabled)\n");
    }

    if settings.debug {
        let log_path = settings
            .output_path
            .parent()
            .map(|dir| dir.join("patch_log.txt"))
            .unwrap_or_else(|| PathBuf::from("patch_log.txt"));
        fs::write(log_path, log)?;
    }

    Ok(())
}
