//! Flash layout constants
//!
//! A [`Layout`] describes how big each flash area is and which device it lives
//! on. Offsets are not part of the layout: the registry computes them by
//! packing the areas back to back on each device, in the fixed order
//! bootloader, primary slots, secondary slots, scratch.
//!
//! Layouts are normally `const` items in board support code:
//!
//! ```ignore
//! use flashmap_core::{ExternalFlash, Layout};
//!
//! const LAYOUT: Layout = Layout::single_image(0x1000_0000, 0x1_8000, 0x1_0000, 0x1_0000, 0x1000)
//!     .with_external_secondary(0, ExternalFlash::new(1, 0x1800_0000));
//! ```
//!
//! With the `std` feature they can also be loaded from TOML or RON files.

#[cfg(feature = "std")]
mod file;

use crate::area::MAX_IMAGES;
use crate::device::DeviceId;

/// Sizes of one image's slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Size of the primary slot in bytes
    pub primary_size: u32,
    /// Size of the secondary slot in bytes
    pub secondary_size: u32,
    /// The secondary slot lives on external flash
    pub secondary_external: bool,
}

impl ImageLayout {
    /// Image with both slots on internal flash
    pub const fn new(primary_size: u32, secondary_size: u32) -> Self {
        Self {
            primary_size,
            secondary_size,
            secondary_external: false,
        }
    }

    const EMPTY: Self = Self::new(0, 0);
}

/// External flash configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalFlash {
    /// Device index on the external memory interface
    pub index: u8,
    /// Address of the first byte of the device, usually its memory-mapped window
    pub base: u32,
}

impl ExternalFlash {
    /// Create a new external flash configuration
    pub const fn new(index: u8, base: u32) -> Self {
        Self { index, base }
    }

    /// Device id of this flash
    pub const fn device(&self) -> DeviceId {
        DeviceId::External { index: self.index }
    }
}

/// Value of an erased byte per device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErasedValues {
    /// Erased value of internal flash
    pub internal: u8,
    /// Erased value of external flash
    pub external: u8,
}

impl ErasedValues {
    /// Internal NOR reads back 0x00 after erase, serial NOR 0xFF
    pub const DEFAULT: Self = Self {
        internal: 0x00,
        external: 0xFF,
    };

    /// Erased value of the given device
    pub const fn for_device(&self, device: DeviceId) -> u8 {
        match device {
            DeviceId::Internal => self.internal,
            DeviceId::External { .. } => self.external,
        }
    }
}

impl Default for ErasedValues {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Flash layout of a bootloader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Address of the first byte of internal flash
    pub flash_base: u32,
    /// Size of the bootloader area
    pub bootloader_size: u32,
    /// Number of configured images, 1 or 2
    pub image_count: u8,
    /// Slot sizes; entries past `image_count` are ignored
    pub images: [ImageLayout; MAX_IMAGES],
    /// Size of the scratch area
    pub scratch_size: u32,
    /// External flash, if the board has one
    pub external: Option<ExternalFlash>,
    /// Erased values per device class
    pub erased: ErasedValues,
}

impl Layout {
    /// Layout with one image, everything on internal flash
    pub const fn single_image(
        flash_base: u32,
        bootloader_size: u32,
        primary_size: u32,
        secondary_size: u32,
        scratch_size: u32,
    ) -> Self {
        Self {
            flash_base,
            bootloader_size,
            image_count: 1,
            images: [
                ImageLayout::new(primary_size, secondary_size),
                ImageLayout::EMPTY,
            ],
            scratch_size,
            external: None,
            erased: ErasedValues::DEFAULT,
        }
    }

    /// Layout with two images, everything on internal flash
    pub const fn dual_image(
        flash_base: u32,
        bootloader_size: u32,
        image0: ImageLayout,
        image1: ImageLayout,
        scratch_size: u32,
    ) -> Self {
        Self {
            flash_base,
            bootloader_size,
            image_count: 2,
            images: [image0, image1],
            scratch_size,
            external: None,
            erased: ErasedValues::DEFAULT,
        }
    }

    /// Move the secondary slot of `image` to external flash
    ///
    /// # Panics
    ///
    /// Panics if `image` is not below [`MAX_IMAGES`]. In a `const` item this
    /// is a compile error.
    pub const fn with_external_secondary(mut self, image: u8, external: ExternalFlash) -> Self {
        assert!((image as usize) < MAX_IMAGES, "image index out of range");
        self.images[image as usize].secondary_external = true;
        self.external = Some(external);
        self
    }

    /// Override the erased values
    pub const fn with_erased_values(mut self, erased: ErasedValues) -> Self {
        self.erased = erased;
        self
    }

    /// The configured images
    pub fn images(&self) -> &[ImageLayout] {
        let count = (self.image_count as usize).min(MAX_IMAGES);
        &self.images[..count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE: Layout = Layout::single_image(0x1000_0000, 0x1000, 0x8000, 0x8000, 0x1000);

    #[test]
    fn test_single_image() {
        assert_eq!(SINGLE.images().len(), 1);
        assert_eq!(SINGLE.images()[0].primary_size, 0x8000);
        assert!(SINGLE.external.is_none());
        assert_eq!(SINGLE.erased, ErasedValues::DEFAULT);
    }

    #[test]
    fn test_external_secondary() {
        const LAYOUT: Layout = Layout::dual_image(
            0x1000_0000,
            0x1000,
            ImageLayout::new(0x8000, 0x8000),
            ImageLayout::new(0x4000, 0x4000),
            0x1000,
        )
        .with_external_secondary(1, ExternalFlash::new(1, 0x1800_0000));

        assert!(!LAYOUT.images()[0].secondary_external);
        assert!(LAYOUT.images()[1].secondary_external);
        assert_eq!(
            LAYOUT.external.map(|e| e.device()),
            Some(DeviceId::External { index: 1 })
        );
    }

    #[test]
    fn test_erased_values() {
        let erased = ErasedValues::default();
        assert_eq!(erased.for_device(DeviceId::Internal), 0x00);
        assert_eq!(erased.for_device(DeviceId::External { index: 3 }), 0xFF);

        let layout = SINGLE.with_erased_values(ErasedValues {
            internal: 0xFF,
            external: 0xFF,
        });
        assert_eq!(layout.erased.for_device(DeviceId::Internal), 0xFF);
    }

    #[test]
    fn test_images_clamps_count() {
        let mut layout = SINGLE;
        layout.image_count = 9;
        assert_eq!(layout.images().len(), MAX_IMAGES);
        layout.image_count = 0;
        assert!(layout.images().is_empty());
    }
}
