//! flashmap-core - Flash area abstraction for secure bootloaders
//!
//! This crate maps logical flash areas (bootloader, image slots, scratch) onto
//! physical flash devices. Upper bootloader layers open an area by its logical
//! id and then read, write and erase using offsets relative to that area; the
//! access layer enforces that no operation ever leaves the area's bounds.
//!
//! It is `no_std` and allocation-free so it can run inside the bootloader
//! itself.
//!
//! # Features
//!
//! - `std` - Layout files (TOML, RON) and a process-wide registry
//!
//! # Example
//!
//! ```no_run
//! use flashmap_core::{area_id, Drivers, FlashMap, Layout, Registry};
//!
//! const LAYOUT: Layout = Layout::single_image(0x1000_0000, 0x1000, 0x8000, 0x8000, 0x1000);
//!
//! fn first_word<D: flashmap_core::FlashDriver>(flash: D) -> flashmap_core::Result<[u8; 4]> {
//!     let registry = Registry::new(&LAYOUT);
//!     let mut map = FlashMap::new(&registry, Drivers::internal_only(flash));
//!     let area = map.open(area_id(0, 0)?)?;
//!     let mut word = [0u8; 4];
//!     map.read(&area, 0, &mut word)?;
//!     map.close(area);
//!     Ok(word)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod access;
pub mod area;
pub mod device;
pub mod error;
#[cfg(feature = "std")]
pub mod global;
pub mod layout;
pub mod registry;

pub use access::{Area, FlashMap, Sector};
pub use area::{
    area_id, area_id_for_slot, slot_for_area, slot_of, AreaId, FlashAreaDescriptor, MAX_IMAGES,
};
pub use device::{Absent, Backend, DeviceId, Drivers, FlashDriver};
pub use error::{DriverError, Error, LayoutError, Result};
pub use layout::{ErasedValues, ExternalFlash, ImageLayout, Layout};
pub use registry::{Registry, MAX_AREAS};
