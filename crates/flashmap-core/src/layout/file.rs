//! Layout file parsing
//!
//! Parses layout files in TOML format:
//!
//! ```toml
//! [layout]
//! flash_base = "0x10000000"
//! bootloader_size = "4 KiB"
//! scratch_size = "4 KiB"
//!
//! [external]
//! index = 1
//! base = "0x18000000"
//!
//! [erased]
//! internal = 0x00
//! external = 0xFF
//!
//! [[image]]
//! primary_size = "32 KiB"
//! secondary_size = "32 KiB"
//! secondary_device = "external"
//! ```
//!
//! The same structure is accepted in RON. Numbers may be integers, `0x`
//! prefixed hex strings or sizes with a `B`, `KiB` or `MiB` suffix.

use std::format;
use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use log::debug;

use super::{ErasedValues, ExternalFlash, ImageLayout, Layout};
use crate::area::MAX_IMAGES;
use crate::error::LayoutError;

/// Layout file structure
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutFile {
    layout: LayoutMeta,
    #[serde(default)]
    external: Option<ExternalMeta>,
    #[serde(default)]
    erased: ErasedMeta,
    image: Vec<ImageEntry>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutMeta {
    #[serde(deserialize_with = "deserialize_u32")]
    flash_base: u32,
    #[serde(deserialize_with = "deserialize_u32")]
    bootloader_size: u32,
    #[serde(deserialize_with = "deserialize_u32")]
    scratch_size: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ExternalMeta {
    index: u8,
    #[serde(deserialize_with = "deserialize_u32")]
    base: u32,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ErasedMeta {
    internal: u8,
    external: u8,
}

impl Default for ErasedMeta {
    fn default() -> Self {
        Self {
            internal: ErasedValues::DEFAULT.internal,
            external: ErasedValues::DEFAULT.external,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageEntry {
    #[serde(deserialize_with = "deserialize_u32")]
    primary_size: u32,
    #[serde(deserialize_with = "deserialize_u32")]
    secondary_size: u32,
    #[serde(default)]
    secondary_device: Placement,
}

#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
enum Placement {
    #[default]
    Internal,
    External,
}

/// Deserialize a u32 given as integer, hex string or size string
fn deserialize_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrStr {
        Int(u32),
        Str(String),
    }

    match IntOrStr::deserialize(deserializer)? {
        IntOrStr::Int(n) => Ok(n),
        IntOrStr::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a size string like "32 KiB", "0x8000" or "4096"
fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("b") {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier).ok_or_else(|| format!("size too large: {}", s))
}

impl LayoutFile {
    fn into_layout(self) -> Result<Layout, LayoutError> {
        let count = self.image.len();
        if count == 0 || count > MAX_IMAGES {
            return Err(LayoutError::ImageCount(count.min(u8::MAX as usize) as u8));
        }

        let mut images = [ImageLayout::EMPTY; MAX_IMAGES];
        for (slot, entry) in images.iter_mut().zip(&self.image) {
            *slot = ImageLayout {
                primary_size: entry.primary_size,
                secondary_size: entry.secondary_size,
                secondary_external: entry.secondary_device == Placement::External,
            };
        }

        Ok(Layout {
            flash_base: self.layout.flash_base,
            bootloader_size: self.layout.bootloader_size,
            image_count: count as u8,
            images,
            scratch_size: self.layout.scratch_size,
            external: self.external.map(|e| ExternalFlash::new(e.index, e.base)),
            erased: ErasedValues {
                internal: self.erased.internal,
                external: self.erased.external,
            },
        })
    }
}

impl Layout {
    /// Load a layout from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            debug!("cannot read layout {}: {}", path.display(), e);
            LayoutError::Io
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a layout from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, LayoutError> {
        let file: LayoutFile = toml::from_str(content).map_err(|e| {
            debug!("invalid TOML layout: {}", e);
            LayoutError::Parse
        })?;
        file.into_layout()
    }

    /// Parse a layout from a RON string
    pub fn from_ron_str(content: &str) -> Result<Self, LayoutError> {
        let file: LayoutFile = ron::from_str(content).map_err(|e| {
            debug!("invalid RON layout: {}", e);
            LayoutError::Parse
        })?;
        file.into_layout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceId;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("32KiB").unwrap(), 0x8000);
        assert_eq!(parse_size("2 MiB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("512 B").unwrap(), 512);
        assert!(parse_size("4 GiB").is_err());
        assert!(parse_size("8192 MiB").is_err());
        assert!(parse_size("0xZZ").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[layout]
flash_base = "0x10000000"
bootloader_size = "4 KiB"
scratch_size = 4096

[external]
index = 1
base = "0x18000000"

[[image]]
primary_size = "32 KiB"
secondary_size = 0x8000

[[image]]
primary_size = "16 KiB"
secondary_size = "16 KiB"
secondary_device = "external"
"#;
        let layout = Layout::from_toml_str(toml).unwrap();
        assert_eq!(layout.flash_base, 0x1000_0000);
        assert_eq!(layout.bootloader_size, 0x1000);
        assert_eq!(layout.scratch_size, 0x1000);
        assert_eq!(layout.image_count, 2);
        assert_eq!(layout.images()[0], ImageLayout::new(0x8000, 0x8000));
        assert!(layout.images()[1].secondary_external);
        assert_eq!(layout.external, Some(ExternalFlash::new(1, 0x1800_0000)));
        assert_eq!(layout.erased, ErasedValues::DEFAULT);
    }

    #[test]
    fn test_parse_toml_erased_override() {
        let toml = r#"
[layout]
flash_base = 0
bootloader_size = 0x1000
scratch_size = 0x1000

[erased]
internal = 0xFF

[[image]]
primary_size = 0x2000
secondary_size = 0x2000
"#;
        let layout = Layout::from_toml_str(toml).unwrap();
        assert_eq!(layout.erased.for_device(DeviceId::Internal), 0xFF);
        assert_eq!(layout.erased.external, 0xFF);
        assert!(layout.external.is_none());
    }

    #[test]
    fn test_parse_toml_errors() {
        assert_eq!(Layout::from_toml_str("not toml ["), Err(LayoutError::Parse));

        let no_images = r#"
image = []

[layout]
flash_base = 0
bootloader_size = 0x1000
scratch_size = 0x1000
"#;
        assert_eq!(
            Layout::from_toml_str(no_images),
            Err(LayoutError::ImageCount(0))
        );

        let unknown_device = r#"
[layout]
flash_base = 0
bootloader_size = 0x1000
scratch_size = 0x1000

[[image]]
primary_size = 0x2000
secondary_size = 0x2000
secondary_device = "sdcard"
"#;
        assert_eq!(
            Layout::from_toml_str(unknown_device),
            Err(LayoutError::Parse)
        );
    }

    #[test]
    fn test_parse_ron() {
        let ron = r#"(
    layout: (
        flash_base: "0x10000000",
        bootloader_size: "4 KiB",
        scratch_size: "4 KiB",
    ),
    image: [
        (primary_size: "32 KiB", secondary_size: "32 KiB"),
    ],
)"#;
        let layout = Layout::from_ron_str(ron).unwrap();
        assert_eq!(
            layout,
            Layout::single_image(0x1000_0000, 0x1000, 0x8000, 0x8000, 0x1000)
        );
    }

    #[test]
    fn test_load_toml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[layout]
flash_base = "0x10000000"
bootloader_size = "4 KiB"
scratch_size = "4 KiB"

[[image]]
primary_size = "32 KiB"
secondary_size = "32 KiB"
"#,
        )
        .unwrap();

        let layout = Layout::from_toml_file(file.path()).unwrap();
        assert_eq!(
            layout,
            Layout::single_image(0x1000_0000, 0x1000, 0x8000, 0x8000, 0x1000)
        );
    }

    #[test]
    fn test_missing_file() {
        assert_eq!(
            Layout::from_toml_file("/nonexistent/flashmap/layout.toml"),
            Err(LayoutError::Io)
        );
    }
}
