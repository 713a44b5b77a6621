//! flashmap-sim - In-memory flash emulator for testing
//!
//! This crate provides [`SimFlash`], a [`FlashDriver`](flashmap_core::FlashDriver)
//! backed by a byte vector. It models internal NOR rows that erase to 0x00 as
//! well as serial NOR behind a memory-mapped window that erases to 0xFF, so a
//! complete flash map can be exercised on the host.
//!
//! # Example
//!
//! ```
//! use flashmap_core::{AreaId, Drivers, FlashMap, Layout, Registry};
//! use flashmap_sim::{SimConfig, SimFlash};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = Layout::single_image(0x1000_0000, 0x1000, 0x8000, 0x8000, 0x1000);
//! let registry = Registry::new(&layout);
//! let flash = SimFlash::new(SimConfig::internal(0x1000_0000, 0x12000))?;
//! let mut map = FlashMap::new(&registry, Drivers::internal_only(flash));
//! let area = map.open(AreaId::Primary(0))?;
//! map.write(&area, 0, &[0x5A; 512])?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod flash;

pub use config::SimConfig;
pub use error::SimError;
pub use flash::{Op, SimFlash, SimStats};
