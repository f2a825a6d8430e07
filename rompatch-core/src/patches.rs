use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::image::Image;
use crate::{PatchError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum PatchElement {
    Block(BTreeMap<String, Vec<u8>>),
    #[allow(dead_code)]
    Other(serde_json::Value),
}

fn parse_address(key: &str) -> Result<u32> {
    let t = key.trim();
    let res = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        t.parse::<u32>()
    };

    res.map_err(|e| PatchError::Config(format!("invalid patch address '{t}': {e}")))
}

/// A list of `(address, bytes)` blocks to copy into the image verbatim.
///
/// On disk this is a JSON array of objects mapping address strings to byte
/// arrays; array elements of any other shape are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    blocks: Vec<(u32, Vec<u8>)>,
}

impl PatchSet {
    pub fn from_json_str(src: &str) -> Result<Self> {
        let elements: Vec<PatchElement> = serde_json::from_str(src)?;

        let mut blocks = Vec::new();
        for element in elements {
            if let PatchElement::Block(map) = element {
                for (key, bytes) in map {
                    blocks.push((parse_address(&key)?, bytes));
                }
            }
        }

        Ok(Self { blocks })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the number of bytes written.
    pub fn apply(&self, image: &mut Image) -> Result<usize> {
        let mut written = 0;
        for (address, bytes) in &self.blocks {
            image.write_bytes(*address, bytes)?;
            written += bytes.len();
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_object_blocks_and_skips_other_elements() {
        let set = PatchSet::from_json_str(
            r#"[
                {"16": [1, 2, 3], "0x40": [255]},
                "comment",
                42,
                {"32": [9]}
            ]"#,
        )
        .unwrap();
        assert_eq!(set.len(), 3);

        let mut image = Image::blank();
        assert_eq!(set.apply(&mut image).unwrap(), 5);
        assert_eq!(image.read_bytes(16, 3).unwrap(), &[1, 2, 3]);
        assert_eq!(image.read_u8(32).unwrap(), 9);
        assert_eq!(image.read_u8(0x40).unwrap(), 0xFF);
    }

    #[test]
    fn bad_address_is_a_config_error() {
        let err = PatchSet::from_json_str(r#"[{"0x12G": [1]}]"#).unwrap_err();
        assert!(matches!(err, PatchError::Config(_)));
    }

    #[test]
    fn out_of_range_block_fails_to_apply() {
        let set = PatchSet::from_json_str(r#"[{"67108863": [1, 2]}]"#).unwrap();
        assert!(matches!(
            set.apply(&mut Image::blank()),
            Err(PatchError::OutOfBounds { .. })
        ));
    }
}
