//! Physical flash devices and the driver capability
//!
//! Every flash area lives on a device identified by a [`DeviceId`]. The access
//! layer never touches hardware itself; it asks a [`Backend`] for the
//! [`FlashDriver`] bound to the area's device and forwards the translated
//! request to it.

use core::fmt;

use crate::error::DriverError;

/// Identifier of a physical flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceId {
    /// The MCU's internal NOR flash
    Internal,
    /// An external serial flash, selected by its bus/device index
    External {
        /// Device index on the external memory interface
        index: u8,
    },
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal flash"),
            Self::External { index } => write!(f, "external flash #{}", index),
        }
    }
}

/// Raw access to one physical flash device
///
/// Implemented by board support code. Addresses are physical addresses as
/// produced by [`FlashDriver::physical_address`]; the caller has already
/// checked that the access stays inside a configured flash area.
///
/// # Example
///
/// ```ignore
/// use flashmap_core::{DriverError, FlashDriver};
///
/// struct Psoc6Flash;
///
/// impl FlashDriver for Psoc6Flash {
///     fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), DriverError> {
///         let src = unsafe { core::slice::from_raw_parts(addr as *const u8, buf.len()) };
///         buf.copy_from_slice(src);
///         Ok(())
///     }
///     // ...
/// }
/// ```
pub trait FlashDriver {
    /// Read `buf.len()` bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), DriverError>;

    /// Program `data` starting at `addr`
    ///
    /// The target range is expected to be erased.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), DriverError>;

    /// Erase `len` bytes starting at `addr`
    fn erase(&mut self, addr: u32, len: u32) -> Result<(), DriverError>;

    /// Smallest erasable unit in bytes (sector or row size)
    ///
    /// Zero means the geometry is unknown.
    fn erase_unit(&self) -> u32;

    /// Required alignment of program operations in bytes
    ///
    /// Zero means the geometry is unknown.
    fn write_align(&self) -> u32;

    /// Translate an area base address and area-relative offset into the
    /// address this driver expects
    ///
    /// Memory-mapped internal flash uses the absolute address. Drivers that
    /// address their device from zero while areas are described by a
    /// memory-mapped window override this.
    fn physical_address(&self, area_base: u32, offset: u32) -> u32 {
        area_base.wrapping_add(offset)
    }
}

impl<D: FlashDriver + ?Sized> FlashDriver for &mut D {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), DriverError> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), DriverError> {
        (**self).write(addr, data)
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<(), DriverError> {
        (**self).erase(addr, len)
    }

    fn erase_unit(&self) -> u32 {
        (**self).erase_unit()
    }

    fn write_align(&self) -> u32 {
        (**self).write_align()
    }

    fn physical_address(&self, area_base: u32, offset: u32) -> u32 {
        (**self).physical_address(area_base, offset)
    }
}

/// Resolves device ids to drivers
pub trait Backend {
    /// Driver bound to `device`, if any
    fn driver(&self, device: DeviceId) -> Option<&dyn FlashDriver>;

    /// Mutable driver bound to `device`, if any
    fn driver_mut(&mut self, device: DeviceId) -> Option<&mut dyn FlashDriver>;
}

/// Placeholder for a missing external flash driver
///
/// This type has no values, so a `Drivers<I, Absent>` can never dispatch to
/// external flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absent {}

impl FlashDriver for Absent {
    fn read(&mut self, _addr: u32, _buf: &mut [u8]) -> Result<(), DriverError> {
        match *self {}
    }

    fn write(&mut self, _addr: u32, _data: &[u8]) -> Result<(), DriverError> {
        match *self {}
    }

    fn erase(&mut self, _addr: u32, _len: u32) -> Result<(), DriverError> {
        match *self {}
    }

    fn erase_unit(&self) -> u32 {
        match *self {}
    }

    fn write_align(&self) -> u32 {
        match *self {}
    }
}

/// Stock backend: internal flash plus at most one external device
#[derive(Debug)]
pub struct Drivers<I, E = Absent> {
    internal: I,
    external: Option<(u8, E)>,
}

impl<I: FlashDriver> Drivers<I, Absent> {
    /// Backend with internal flash only
    pub fn internal_only(internal: I) -> Self {
        Self {
            internal,
            external: None,
        }
    }
}

impl<I: FlashDriver, E: FlashDriver> Drivers<I, E> {
    /// Backend with internal flash and the external device `index`
    pub fn with_external(internal: I, index: u8, external: E) -> Self {
        Self {
            internal,
            external: Some((index, external)),
        }
    }

    /// Internal flash driver
    pub fn internal(&self) -> &I {
        &self.internal
    }

    /// Mutable internal flash driver
    pub fn internal_mut(&mut self) -> &mut I {
        &mut self.internal
    }

    /// External flash driver, if one is bound
    pub fn external(&self) -> Option<&E> {
        self.external.as_ref().map(|(_, driver)| driver)
    }

    /// Give the drivers back
    pub fn into_parts(self) -> (I, Option<E>) {
        (self.internal, self.external.map(|(_, driver)| driver))
    }
}

impl<I: FlashDriver, E: FlashDriver> Backend for Drivers<I, E> {
    fn driver(&self, device: DeviceId) -> Option<&dyn FlashDriver> {
        match device {
            DeviceId::Internal => Some(&self.internal as &dyn FlashDriver),
            DeviceId::External { index } => match self.external.as_ref() {
                Some((bound, driver)) if *bound == index => Some(driver as &dyn FlashDriver),
                _ => None,
            },
        }
    }

    fn driver_mut(&mut self, device: DeviceId) -> Option<&mut dyn FlashDriver> {
        match device {
            DeviceId::Internal => Some(&mut self.internal as &mut dyn FlashDriver),
            DeviceId::External { index } => match self.external.as_mut() {
                Some((bound, driver)) if *bound == index => Some(driver as &mut dyn FlashDriver),
                _ => None,
            },
        }
    }
}
