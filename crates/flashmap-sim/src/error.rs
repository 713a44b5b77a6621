//! Error types for the flash simulator

use thiserror::Error;

/// Invalid simulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// Device size is zero
    #[error("simulated flash has zero size")]
    ZeroSize,

    /// Erase unit is zero, not a power of two, or does not divide the size
    #[error("invalid erase unit {unit:#x} for a device of {size:#x} bytes")]
    InvalidEraseUnit { unit: u32, size: u32 },

    /// Write alignment is zero or not a power of two
    #[error("invalid write alignment {0:#x}")]
    InvalidWriteAlign(u32),

    /// Device does not fit in the 32-bit address space
    #[error("device at {base:#x} with {size:#x} bytes exceeds the 32-bit address space")]
    AddressOverflow { base: u32, size: u32 },

    /// Initial contents are larger than the device
    #[error("initial data of {len} bytes does not fit a device of {size:#x} bytes")]
    DataTooLarge { len: usize, size: u32 },
}
