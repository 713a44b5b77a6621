//! Area access layer
//!
//! [`FlashMap`] ties a [`Registry`] to a [`Backend`]. Callers open an area by
//! id and then address it with area-relative offsets. Every access is checked
//! against the area size before a driver sees it, so an upper layer can never
//! reach outside the area it opened.

use log::{debug, trace, warn};

use crate::area::{AreaId, FlashAreaDescriptor};
use crate::device::{Backend, DeviceId, FlashDriver};
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Handle to an open flash area
///
/// Borrows the area's descriptor from the registry. Handles are plain views:
/// any number of them may exist for the same area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area<'r> {
    desc: &'r FlashAreaDescriptor,
}

impl<'r> Area<'r> {
    /// Logical id of the area
    pub fn id(&self) -> AreaId {
        self.desc.id
    }

    /// Device holding the area
    pub fn device(&self) -> DeviceId {
        self.desc.device
    }

    /// Physical address of the first byte of the area
    pub fn base_offset(&self) -> u32 {
        self.desc.base_offset
    }

    /// Size of the area in bytes
    pub fn size(&self) -> u32 {
        self.desc.size
    }

    /// The underlying descriptor
    pub fn descriptor(&self) -> &'r FlashAreaDescriptor {
        self.desc
    }
}

/// One erase unit of an area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sector {
    /// Physical address of the sector
    pub offset: u32,
    /// Size of the sector in bytes
    pub size: u32,
}

/// Flash area access over a registry and a set of drivers
pub struct FlashMap<'r, B> {
    registry: &'r Registry,
    backend: B,
}

impl<'r, B: Backend> FlashMap<'r, B> {
    /// Create a new flash map
    pub fn new(registry: &'r Registry, backend: B) -> Self {
        Self { registry, backend }
    }

    /// The area table
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// The driver backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the driver backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Give the backend back
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Open an area by id
    pub fn open(&self, id: AreaId) -> Result<Area<'r>> {
        match self.registry.lookup(id) {
            Some(desc) => {
                trace!("open {}", id);
                Ok(Area { desc })
            }
            None => {
                debug!("open {}: not configured", id);
                Err(Error::NotFound)
            }
        }
    }

    /// Close an area
    ///
    /// Handles hold no device resources, so this only consumes the handle.
    pub fn close(&self, area: Area<'r>) {
        trace!("close {}", area.id());
    }

    /// Read `buf.len()` bytes at `offset` within the area
    pub fn read(&mut self, area: &Area<'_>, offset: u32, buf: &mut [u8]) -> Result<()> {
        let (driver, addr) = self.target(area, offset, buf.len(), "read")?;
        trace!("read {} bytes at 0x{:08X}", buf.len(), addr);
        driver.read(addr, buf)?;
        Ok(())
    }

    /// Program `data` at `offset` within the area
    pub fn write(&mut self, area: &Area<'_>, offset: u32, data: &[u8]) -> Result<()> {
        let (driver, addr) = self.target(area, offset, data.len(), "write")?;
        trace!("write {} bytes at 0x{:08X}", data.len(), addr);
        driver.write(addr, data)?;
        Ok(())
    }

    /// Erase `len` bytes at `offset` within the area
    pub fn erase(&mut self, area: &Area<'_>, offset: u32, len: u32) -> Result<()> {
        let (driver, addr) = self.target(area, offset, len as usize, "erase")?;
        trace!("erase {} bytes at 0x{:08X}", len, addr);
        driver.erase(addr, len)?;
        Ok(())
    }

    /// Erase granularity of the area's device
    pub fn erase_unit_size(&self, area: &Area<'_>) -> Result<u32> {
        self.geometry(area.device(), |driver| driver.erase_unit())
    }

    /// Write alignment of the area's device
    pub fn align(&self, area: &Area<'_>) -> Result<u32> {
        self.geometry(area.device(), |driver| driver.write_align())
    }

    /// Value an erased byte of the area reads back as
    pub fn erased_value(&self, area: &Area<'_>) -> u8 {
        self.registry.erased_values().for_device(area.device())
    }

    /// Read into `buf` and check whether every byte is erased
    pub fn read_is_empty(&mut self, area: &Area<'_>, offset: u32, buf: &mut [u8]) -> Result<bool> {
        self.read(area, offset, buf)?;
        let erased = self.erased_value(area);
        Ok(buf.iter().all(|&b| b == erased))
    }

    /// Fill `out` with the sectors of an area
    ///
    /// Returns the number of sectors written. All sectors have the erase unit
    /// size of the device; the last one may reach past the end of the area if
    /// the area size is not a multiple of it.
    pub fn sectors_into(&self, id: AreaId, out: &mut [Sector]) -> Result<usize> {
        let layout = self.sector_layout(id, out.len())?;
        for (slot, sector) in out.iter_mut().zip(layout.iter()) {
            *slot = sector;
        }
        Ok(layout.count)
    }

    /// Sectors of an area, with room for at most `N`
    pub fn sectors<const N: usize>(&self, id: AreaId) -> Result<heapless::Vec<Sector, N>> {
        let layout = self.sector_layout(id, N)?;
        let mut sectors = heapless::Vec::new();
        for sector in layout.iter() {
            sectors.push(sector).map_err(|_| Error::TooManySectors {
                needed: layout.count,
                capacity: N,
            })?;
        }
        Ok(sectors)
    }

    fn sector_layout(&self, id: AreaId, capacity: usize) -> Result<SectorLayout> {
        let desc = self.registry.find(id).map_err(|e| {
            debug!("sectors of {}: not configured", id);
            e
        })?;
        let unit = self.geometry(desc.device, |driver| driver.erase_unit())?;
        let count = desc.size.div_ceil(unit) as usize;
        if count > capacity {
            warn!("{} has {} sectors, room for {}", id, count, capacity);
            return Err(Error::TooManySectors {
                needed: count,
                capacity,
            });
        }
        Ok(SectorLayout {
            base: desc.base_offset,
            unit,
            count,
        })
    }

    fn geometry(&self, device: DeviceId, f: impl FnOnce(&dyn FlashDriver) -> u32) -> Result<u32> {
        let driver = self.backend.driver(device).ok_or_else(|| {
            warn!("no driver for {}", device);
            Error::UnsupportedDevice
        })?;
        match f(driver) {
            0 => {
                warn!("{} reports no geometry", device);
                Err(Error::UnsupportedDevice)
            }
            n => Ok(n),
        }
    }

    /// Check bounds and resolve the driver and physical address for an access
    fn target(
        &mut self,
        area: &Area<'_>,
        offset: u32,
        len: usize,
        op: &str,
    ) -> Result<(&mut dyn FlashDriver, u32)> {
        if !area.desc.contains(offset, len) {
            warn!(
                "{} of {} bytes at 0x{:X} is outside {} (size 0x{:X})",
                op,
                len,
                offset,
                area.id(),
                area.size()
            );
            return Err(Error::OutOfBounds);
        }
        let device = area.device();
        let driver = self.backend.driver_mut(device).ok_or_else(|| {
            warn!("{}: no driver for {}", op, device);
            Error::UnsupportedDevice
        })?;
        let addr = driver.physical_address(area.base_offset(), offset);
        Ok((driver, addr))
    }
}

struct SectorLayout {
    base: u32,
    unit: u32,
    count: usize,
}

impl SectorLayout {
    fn iter(&self) -> impl Iterator<Item = Sector> + '_ {
        (0..self.count).map(move |i| Sector {
            offset: self.base + i as u32 * self.unit,
            size: self.unit,
        })
    }
}
