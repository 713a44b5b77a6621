//! Flash area registry
//!
//! The registry is the table of [`FlashAreaDescriptor`]s for one board. It is
//! built once, validated, and then only read.

use heapless::Vec;
use log::{debug, info};

use crate::area::{AreaId, FlashAreaDescriptor, MAX_IMAGES};
use crate::device::DeviceId;
use crate::error::{Error, LayoutError, Result};
use crate::layout::{ErasedValues, ExternalFlash, Layout};

/// Maximum number of areas in a registry: bootloader, scratch and two slots
/// per image
pub const MAX_AREAS: usize = 2 + 2 * MAX_IMAGES;

/// One past the highest 32-bit address
const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Table of configured flash areas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    areas: Vec<FlashAreaDescriptor, MAX_AREAS>,
    erased: ErasedValues,
}

impl Registry {
    /// Build the area table for a layout
    ///
    /// Areas are packed back to back on each device starting at the device
    /// base, in the order bootloader, primary slots, secondary slots,
    /// scratch.
    pub fn build(layout: &Layout) -> core::result::Result<Self, LayoutError> {
        if layout.image_count == 0 || layout.image_count as usize > MAX_IMAGES {
            return Err(LayoutError::ImageCount(layout.image_count));
        }

        let mut packer = Packer::new(layout.flash_base, layout.external);
        let mut areas: Vec<FlashAreaDescriptor, MAX_AREAS> = Vec::new();
        let mut place = |id: AreaId, on_external: bool, size: u32| {
            let area = packer.place(id, on_external, size)?;
            areas.push(area).map_err(|_| LayoutError::TooManyAreas)
        };

        place(AreaId::Bootloader, false, layout.bootloader_size)?;
        for (i, image) in layout.images().iter().enumerate() {
            place(AreaId::Primary(i as u8), false, image.primary_size)?;
        }
        for (i, image) in layout.images().iter().enumerate() {
            place(
                AreaId::Secondary(i as u8),
                image.secondary_external,
                image.secondary_size,
            )?;
        }
        place(AreaId::Scratch, false, layout.scratch_size)?;

        let registry = Self::from_table(areas, layout.erased)?;
        info!(
            "Flash map: {} areas for {} image(s)",
            registry.len(),
            layout.image_count
        );
        Ok(registry)
    }

    /// Build the area table for a layout known to be valid
    ///
    /// Meant for layouts that are compile-time constants.
    ///
    /// # Panics
    ///
    /// Panics if the layout is invalid.
    pub fn new(layout: &Layout) -> Self {
        match Self::build(layout) {
            Ok(registry) => registry,
            Err(e) => panic!("invalid flash layout: {}", e),
        }
    }

    /// Use a board-provided descriptor table instead of computed offsets
    pub fn from_descriptors(
        descriptors: &[FlashAreaDescriptor],
        erased: ErasedValues,
    ) -> core::result::Result<Self, LayoutError> {
        let areas = Vec::from_slice(descriptors).map_err(|_| LayoutError::TooManyAreas)?;
        let registry = Self::from_table(areas, erased)?;
        info!("Flash map: {} areas from descriptor table", registry.len());
        Ok(registry)
    }

    fn from_table(
        areas: Vec<FlashAreaDescriptor, MAX_AREAS>,
        erased: ErasedValues,
    ) -> core::result::Result<Self, LayoutError> {
        validate(&areas)?;
        for area in &areas {
            debug!(
                "  {}: {} 0x{:08X}..0x{:08X}",
                area.id,
                area.device,
                area.base_offset,
                area.end()
            );
        }
        Ok(Self { areas, erased })
    }

    /// Descriptor of an area, if configured
    pub fn lookup(&self, id: AreaId) -> Option<&FlashAreaDescriptor> {
        self.areas.iter().find(|area| area.id == id)
    }

    /// Descriptor of an area
    pub fn find(&self, id: AreaId) -> Result<&FlashAreaDescriptor> {
        self.lookup(id).ok_or(Error::NotFound)
    }

    /// Iterate over all areas in table order
    pub fn iter(&self) -> core::slice::Iter<'_, FlashAreaDescriptor> {
        self.areas.iter()
    }

    /// Number of areas
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    /// Check if the table has no areas
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Erased values per device class
    pub fn erased_values(&self) -> ErasedValues {
        self.erased
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a FlashAreaDescriptor;
    type IntoIter = core::slice::Iter<'a, FlashAreaDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Hands out consecutive address ranges per device
struct Packer {
    internal: u64,
    external: Option<(ExternalFlash, u64)>,
}

impl Packer {
    fn new(flash_base: u32, external: Option<ExternalFlash>) -> Self {
        Self {
            internal: flash_base as u64,
            external: external.map(|ext| (ext, ext.base as u64)),
        }
    }

    fn place(
        &mut self,
        id: AreaId,
        on_external: bool,
        size: u32,
    ) -> core::result::Result<FlashAreaDescriptor, LayoutError> {
        let (device, cursor) = if on_external {
            match self.external.as_mut() {
                Some((ext, cursor)) => (ext.device(), cursor),
                None => return Err(LayoutError::NoExternalFlash(id)),
            }
        } else {
            (DeviceId::Internal, &mut self.internal)
        };

        let end = *cursor + size as u64;
        if end > ADDRESS_SPACE_END {
            return Err(LayoutError::AddressOverflow(id));
        }
        let area = FlashAreaDescriptor::new(id, device, *cursor as u32, size);
        *cursor = end;
        Ok(area)
    }
}

fn validate(areas: &[FlashAreaDescriptor]) -> core::result::Result<(), LayoutError> {
    for (i, area) in areas.iter().enumerate() {
        if area.size == 0 {
            return Err(LayoutError::EmptyArea(area.id));
        }
        if area.end() > ADDRESS_SPACE_END {
            return Err(LayoutError::AddressOverflow(area.id));
        }
        for other in &areas[..i] {
            if other.id == area.id {
                return Err(LayoutError::DuplicateArea(area.id));
            }
            if other.overlaps(area) {
                return Err(LayoutError::Overlap(other.id, area.id));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ImageLayout;

    const EXT: DeviceId = DeviceId::External { index: 1 };

    fn single() -> Layout {
        Layout::single_image(0x1000_0000, 0x1000, 0x8000, 0x8000, 0x1000)
    }

    #[test]
    fn test_single_image_offsets() {
        let registry = Registry::build(&single()).unwrap();
        assert_eq!(registry.len(), 4);

        let expected = [
            (AreaId::Bootloader, 0x1000_0000, 0x1000),
            (AreaId::Primary(0), 0x1000_1000, 0x8000),
            (AreaId::Secondary(0), 0x1000_9000, 0x8000),
            (AreaId::Scratch, 0x1001_1000, 0x1000),
        ];
        for (id, base, size) in expected {
            let area = registry.find(id).unwrap();
            assert_eq!(area.device, DeviceId::Internal);
            assert_eq!(area.base_offset, base, "{}", id);
            assert_eq!(area.size, size);
        }
    }

    #[test]
    fn test_unknown_ids() {
        let registry = Registry::build(&single()).unwrap();
        assert_eq!(registry.find(AreaId::Primary(1)), Err(Error::NotFound));
        assert!(registry.lookup(AreaId::Secondary(1)).is_none());
    }

    #[test]
    fn test_dual_image_order() {
        let layout = Layout::dual_image(
            0,
            0x100,
            ImageLayout::new(0x200, 0x200),
            ImageLayout::new(0x300, 0x300),
            0x80,
        );
        let registry = Registry::build(&layout).unwrap();
        let bases: std::vec::Vec<_> = registry
            .iter()
            .map(|area| (area.id, area.base_offset))
            .collect();
        assert_eq!(
            bases,
            [
                (AreaId::Bootloader, 0x000),
                (AreaId::Primary(0), 0x100),
                (AreaId::Primary(1), 0x300),
                (AreaId::Secondary(0), 0x600),
                (AreaId::Secondary(1), 0x800),
                (AreaId::Scratch, 0xB00),
            ]
        );
    }

    #[test]
    fn test_external_secondary() {
        let layout = Layout::dual_image(
            0x1000_0000,
            0x1000,
            ImageLayout::new(0x8000, 0x8000),
            ImageLayout::new(0x4000, 0x4000),
            0x1000,
        )
        .with_external_secondary(0, ExternalFlash::new(1, 0x1800_0000))
        .with_external_secondary(1, ExternalFlash::new(1, 0x1800_0000));
        let registry = Registry::build(&layout).unwrap();

        let s0 = registry.find(AreaId::Secondary(0)).unwrap();
        let s1 = registry.find(AreaId::Secondary(1)).unwrap();
        assert_eq!((s0.device, s0.base_offset), (EXT, 0x1800_0000));
        assert_eq!((s1.device, s1.base_offset), (EXT, 0x1800_8000));

        // Internal areas close ranks around the moved slots
        let scratch = registry.find(AreaId::Scratch).unwrap();
        assert_eq!(scratch.base_offset, 0x1000_D000);
    }

    #[test]
    fn test_no_two_areas_overlap() {
        let layout = Layout::dual_image(
            0x1000_0000,
            0x1000,
            ImageLayout::new(0x8000, 0x8000),
            ImageLayout::new(0x4000, 0x4000),
            0x1000,
        )
        .with_external_secondary(1, ExternalFlash::new(0, 0x1000_0000));
        let registry = Registry::build(&layout).unwrap();

        for (i, a) in registry.iter().enumerate() {
            assert!(a.size > 0);
            for b in registry.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{} overlaps {}", a.id, b.id);
            }
        }
    }

    #[test]
    fn test_invalid_layouts() {
        let mut layout = single();
        layout.image_count = 0;
        assert_eq!(Registry::build(&layout), Err(LayoutError::ImageCount(0)));
        layout.image_count = 3;
        assert_eq!(Registry::build(&layout), Err(LayoutError::ImageCount(3)));

        let mut layout = single();
        layout.scratch_size = 0;
        assert_eq!(
            Registry::build(&layout),
            Err(LayoutError::EmptyArea(AreaId::Scratch))
        );

        let mut layout = single();
        layout.images[0].secondary_external = true;
        assert_eq!(
            Registry::build(&layout),
            Err(LayoutError::NoExternalFlash(AreaId::Secondary(0)))
        );

        let layout = Layout::single_image(0xFFFF_0000, 0x1000, 0x8000, 0x8000, 0x1000);
        assert_eq!(
            Registry::build(&layout),
            Err(LayoutError::AddressOverflow(AreaId::Secondary(0)))
        );
    }

    #[test]
    fn test_area_ending_at_4gib() {
        let layout = Layout::single_image(0xFFFE_F000, 0x1000, 0x8000, 0x7000, 0x1000);
        let registry = Registry::build(&layout).unwrap();
        assert_eq!(registry.find(AreaId::Scratch).unwrap().end(), 1 << 32);
    }

    #[test]
    #[should_panic(expected = "invalid flash layout")]
    fn test_new_panics_on_invalid_layout() {
        let mut layout = single();
        layout.bootloader_size = 0;
        Registry::new(&layout);
    }

    #[test]
    fn test_from_descriptors() {
        let table = [
            FlashAreaDescriptor::new(AreaId::Bootloader, DeviceId::Internal, 0x0, 0x1000),
            FlashAreaDescriptor::new(AreaId::Primary(0), DeviceId::Internal, 0x1000, 0x4000),
            FlashAreaDescriptor::new(AreaId::Secondary(0), EXT, 0x0, 0x4000),
        ];
        let registry = Registry::from_descriptors(&table, ErasedValues::DEFAULT).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find(AreaId::Scratch), Err(Error::NotFound));
        assert_eq!(
            registry.iter().copied().collect::<std::vec::Vec<_>>(),
            table
        );
    }

    #[test]
    fn test_from_descriptors_validation() {
        let overlap = [
            FlashAreaDescriptor::new(AreaId::Primary(0), DeviceId::Internal, 0x1000, 0x4000),
            FlashAreaDescriptor::new(AreaId::Secondary(0), DeviceId::Internal, 0x4000, 0x4000),
        ];
        assert_eq!(
            Registry::from_descriptors(&overlap, ErasedValues::DEFAULT),
            Err(LayoutError::Overlap(
                AreaId::Primary(0),
                AreaId::Secondary(0)
            ))
        );

        let duplicate = [
            FlashAreaDescriptor::new(AreaId::Scratch, DeviceId::Internal, 0x0, 0x100),
            FlashAreaDescriptor::new(AreaId::Scratch, EXT, 0x0, 0x100),
        ];
        assert_eq!(
            Registry::from_descriptors(&duplicate, ErasedValues::DEFAULT),
            Err(LayoutError::DuplicateArea(AreaId::Scratch))
        );

        let empty = [FlashAreaDescriptor::new(AreaId::Scratch, EXT, 0x0, 0)];
        assert_eq!(
            Registry::from_descriptors(&empty, ErasedValues::DEFAULT),
            Err(LayoutError::EmptyArea(AreaId::Scratch))
        );

        let overflow = FlashAreaDescriptor::new(AreaId::Scratch, EXT, 0xFFFF_FF00, 0x200);
        assert_eq!(
            Registry::from_descriptors(&[overflow], ErasedValues::DEFAULT),
            Err(LayoutError::AddressOverflow(AreaId::Scratch))
        );

        let scratch = FlashAreaDescriptor::new(AreaId::Scratch, EXT, 0x0, 0x100);
        assert_eq!(
            Registry::from_descriptors(&[scratch; MAX_AREAS + 1], ErasedValues::DEFAULT),
            Err(LayoutError::TooManyAreas)
        );
    }

    #[test]
    fn test_empty_table_and_iteration() {
        let empty = Registry::from_descriptors(&[], ErasedValues::DEFAULT).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.find(AreaId::Bootloader), Err(Error::NotFound));

        let registry = Registry::build(&single()).unwrap();
        assert!(!registry.is_empty());
        let mut total = 0;
        for area in &registry {
            assert_eq!(area.device, DeviceId::Internal);
            total += area.size;
        }
        assert_eq!(total, 0x1000 + 0x8000 + 0x8000 + 0x1000);
    }
}
