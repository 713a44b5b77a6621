//! Flash area identifiers and descriptors
//!
//! Areas are addressed by a logical [`AreaId`]. The mapping between
//! `(image_index, slot)` pairs and ids is a pure function; no table lookup is
//! involved until an area is opened.

use core::fmt;

use crate::device::DeviceId;
use crate::error::{Error, Result};

/// Maximum number of images (primary/secondary pairs) a layout can hold
pub const MAX_IMAGES: usize = 2;

/// Slot number of an image's primary slot
pub const SLOT_PRIMARY: u8 = 0;
/// Slot number of an image's secondary slot
pub const SLOT_SECONDARY: u8 = 1;
/// Slot number of the shared scratch area
pub const SLOT_SCRATCH: u8 = 2;

/// Logical flash area identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AreaId {
    /// The bootloader itself
    Bootloader,
    /// Primary (executable) slot of an image
    Primary(u8),
    /// Secondary (upgrade) slot of an image
    Secondary(u8),
    /// Scratch area used while swapping images
    Scratch,
}

impl AreaId {
    /// Numeric id in the classic flash map numbering
    ///
    /// Bootloader is 0, image 0 uses 1 and 2, scratch is 3, and image `n > 0`
    /// uses `2n + 2` and `2n + 3`. Returns `None` for images beyond
    /// [`MAX_IMAGES`].
    pub const fn raw(self) -> Option<u8> {
        match self {
            Self::Bootloader => Some(0),
            Self::Scratch => Some(3),
            Self::Primary(i) if (i as usize) < MAX_IMAGES => Some(Self::primary_raw(i)),
            Self::Secondary(i) if (i as usize) < MAX_IMAGES => Some(Self::primary_raw(i) + 1),
            _ => None,
        }
    }

    /// Decode a numeric id, the inverse of [`AreaId::raw`]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        let id = match raw {
            0 => Self::Bootloader,
            1 => Self::Primary(0),
            2 => Self::Secondary(0),
            3 => Self::Scratch,
            n => {
                let image = (n - 2) / 2;
                if n % 2 == 0 {
                    Self::Primary(image)
                } else {
                    Self::Secondary(image)
                }
            }
        };
        match id {
            Self::Primary(i) | Self::Secondary(i) if i as usize >= MAX_IMAGES => None,
            id => Some(id),
        }
    }

    /// Image index for slot areas, `None` for bootloader and scratch
    pub const fn image(self) -> Option<u8> {
        match self {
            Self::Primary(i) | Self::Secondary(i) => Some(i),
            Self::Bootloader | Self::Scratch => None,
        }
    }

    const fn primary_raw(image: u8) -> u8 {
        if image == 0 {
            1
        } else {
            2 * image + 2
        }
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootloader => write!(f, "bootloader"),
            Self::Primary(i) => write!(f, "primary slot of image {}", i),
            Self::Secondary(i) => write!(f, "secondary slot of image {}", i),
            Self::Scratch => write!(f, "scratch"),
        }
    }
}

/// Area id for a slot of a given image
///
/// Slot 0 is the primary slot, 1 the secondary slot and 2 the scratch area
/// shared by all images. The image index is not checked here; an image that
/// is not configured fails later when the area is opened.
pub fn area_id(image_index: u8, slot: u8) -> Result<AreaId> {
    match slot {
        SLOT_PRIMARY => Ok(AreaId::Primary(image_index)),
        SLOT_SECONDARY => Ok(AreaId::Secondary(image_index)),
        SLOT_SCRATCH => Ok(AreaId::Scratch),
        _ => Err(Error::InvalidSlot),
    }
}

/// Slot number of an area within a given image
///
/// Only the image's own primary and secondary slots map back to a slot;
/// scratch, the bootloader and other images' areas are rejected.
pub fn slot_of(image_index: u8, id: AreaId) -> Result<u8> {
    match id {
        AreaId::Primary(i) if i == image_index => Ok(SLOT_PRIMARY),
        AreaId::Secondary(i) if i == image_index => Ok(SLOT_SECONDARY),
        _ => Err(Error::InvalidAreaId),
    }
}

/// [`area_id`] for single-image configurations
pub fn area_id_for_slot(slot: u8) -> Result<AreaId> {
    area_id(0, slot)
}

/// [`slot_of`] for single-image configurations
pub fn slot_for_area(id: AreaId) -> Result<u8> {
    slot_of(0, id)
}

/// Placement of one flash area on a physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashAreaDescriptor {
    /// Logical id of the area
    pub id: AreaId,
    /// Device holding the area
    pub device: DeviceId,
    /// Physical address of the first byte of the area
    pub base_offset: u32,
    /// Size of the area in bytes
    pub size: u32,
}

impl FlashAreaDescriptor {
    /// Create a new descriptor
    pub const fn new(id: AreaId, device: DeviceId, base_offset: u32, size: u32) -> Self {
        Self {
            id,
            device,
            base_offset,
            size,
        }
    }

    /// Physical address one past the last byte of the area
    ///
    /// Computed in 64 bits so an area ending exactly at 4 GiB is representable.
    pub const fn end(&self) -> u64 {
        self.base_offset as u64 + self.size as u64
    }

    /// Check that `len` bytes starting at area-relative `offset` stay inside the area
    pub fn contains(&self, offset: u32, len: usize) -> bool {
        (offset as u64)
            .checked_add(len as u64)
            .is_some_and(|end| end <= self.size as u64)
    }

    /// Check if this area shares any byte with another area on the same device
    pub fn overlaps(&self, other: &FlashAreaDescriptor) -> bool {
        self.device == other.device
            && (self.base_offset as u64) < other.end()
            && (other.base_offset as u64) < self.end()
    }
}
