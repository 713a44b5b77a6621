//! Error types for flashmap-core
//!
//! All errors are `Copy` and `no_std` compatible. Access-layer errors are
//! recoverable conditions reported to the caller; layout errors describe a
//! broken configuration and are meant to stop the boot before any area is
//! opened.

use core::fmt;

use crate::area::AreaId;

/// Failure reported by a physical flash driver
///
/// The access layer never interprets these; they are passed through
/// unchanged inside [`Error::Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// Read failed at the given physical address
    ReadFailed {
        /// Physical address of the failed access
        addr: u32,
    },
    /// Program operation failed at the given physical address
    WriteFailed {
        /// Physical address of the failed access
        addr: u32,
    },
    /// Erase failed at the given physical address
    EraseFailed {
        /// Physical address of the failed access
        addr: u32,
    },
    /// Address or length does not meet the device's alignment rules
    Misaligned {
        /// Offending physical address
        addr: u32,
    },
    /// The device did not complete the operation in time
    Timeout,
    /// Vendor specific status code
    Other(i32),
}

/// Access layer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No area with this id is configured
    NotFound,
    /// Slot number is not primary (0), secondary (1) or scratch (2)
    InvalidSlot,
    /// Area id is not the primary or secondary slot of the requested image
    InvalidAreaId,
    /// `offset + length` exceeds the area size
    OutOfBounds,
    /// No driver is bound to the area's device, or its geometry is unknown
    UnsupportedDevice,
    /// Error propagated from the physical driver
    Device(DriverError),
    /// Caller-provided sector capacity is too small
    TooManySectors {
        /// Number of sectors the area spans
        needed: usize,
        /// Number of sectors the caller can hold
        capacity: usize,
    },
}

/// Configuration error detected while building the area table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// Image count must be between 1 and [`MAX_IMAGES`](crate::area::MAX_IMAGES)
    ImageCount(u8),
    /// Area has a size of zero
    EmptyArea(AreaId),
    /// Area end does not fit in the 32-bit address space
    AddressOverflow(AreaId),
    /// Area is placed on external flash but none is configured
    NoExternalFlash(AreaId),
    /// The same id appears twice in the table
    DuplicateArea(AreaId),
    /// Two areas on the same device overlap
    Overlap(AreaId, AreaId),
    /// More areas than the table can hold
    TooManyAreas,
    /// Failed to parse a layout file
    Parse,
    /// Failed to read a layout file
    Io,
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Error::Device(e)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { addr } => write!(f, "read failed at 0x{:08X}", addr),
            Self::WriteFailed { addr } => write!(f, "write failed at 0x{:08X}", addr),
            Self::EraseFailed { addr } => write!(f, "erase failed at 0x{:08X}", addr),
            Self::Misaligned { addr } => write!(f, "misaligned access at 0x{:08X}", addr),
            Self::Timeout => write!(f, "device timed out"),
            Self::Other(code) => write!(f, "device error {}", code),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "flash area not found"),
            Self::InvalidSlot => write!(f, "invalid slot number"),
            Self::InvalidAreaId => write!(f, "area is not a slot of this image"),
            Self::OutOfBounds => write!(f, "access out of area bounds"),
            Self::UnsupportedDevice => write!(f, "unsupported flash device"),
            Self::Device(e) => write!(f, "{}", e),
            Self::TooManySectors { needed, capacity } => write!(
                f,
                "area spans {} sectors, only {} fit in the output",
                needed, capacity
            ),
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageCount(n) => write!(f, "unsupported image count {}", n),
            Self::EmptyArea(id) => write!(f, "{} has zero size", id),
            Self::AddressOverflow(id) => write!(f, "{} exceeds the 32-bit address space", id),
            Self::NoExternalFlash(id) => {
                write!(f, "{} is on external flash but none is configured", id)
            }
            Self::DuplicateArea(id) => write!(f, "{} is defined more than once", id),
            Self::Overlap(a, b) => write!(f, "{} overlaps {}", a, b),
            Self::TooManyAreas => write!(f, "too many flash areas"),
            Self::Parse => write!(f, "failed to parse layout"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DriverError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for LayoutError {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
