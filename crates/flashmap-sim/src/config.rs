//! Simulated device geometry

use crate::error::SimError;

/// Configuration of a simulated flash device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Address of the first byte as seen by driver calls
    pub base: u32,
    /// Device size in bytes
    pub size: u32,
    /// Erase granularity in bytes
    pub erase_unit: u32,
    /// Required alignment of program operations in bytes
    pub write_align: u32,
    /// Value of an erased byte
    pub erased_value: u8,
    /// Memory-mapped window the flash areas are described in
    ///
    /// When set, area addresses are translated by subtracting the window
    /// base and adding `base`, the way a serial flash behind an XIP window
    /// is programmed through device-relative addresses.
    pub window: Option<u32>,
}

impl SimConfig {
    /// Memory-mapped internal NOR with 512-byte rows that erase to 0x00
    pub fn internal(base: u32, size: u32) -> Self {
        Self {
            base,
            size,
            erase_unit: 512,
            write_align: 512,
            erased_value: 0x00,
            window: None,
        }
    }

    /// Serial NOR with 4 KiB sectors that erase to 0xFF, addressed from zero
    /// and mapped at `window`
    pub fn serial_nor(window: u32, size: u32) -> Self {
        Self {
            base: 0,
            size,
            erase_unit: 4096,
            write_align: 1,
            erased_value: 0xFF,
            window: Some(window),
        }
    }

    /// Check the geometry for consistency
    pub fn validate(&self) -> Result<(), SimError> {
        if self.size == 0 {
            return Err(SimError::ZeroSize);
        }
        if !self.erase_unit.is_power_of_two() || self.size % self.erase_unit != 0 {
            return Err(SimError::InvalidEraseUnit {
                unit: self.erase_unit,
                size: self.size,
            });
        }
        if !self.write_align.is_power_of_two() {
            return Err(SimError::InvalidWriteAlign(self.write_align));
        }
        if self.base as u64 + self.size as u64 > 1 << 32 {
            return Err(SimError::AddressOverflow {
                base: self.base,
                size: self.size,
            });
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::internal(0x1000_0000, 0x10_0000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
        assert_eq!(
            SimConfig::serial_nor(0x1800_0000, 0x80_0000).validate(),
            Ok(())
        );
    }

    #[test]
    fn test_invalid_geometry() {
        let mut config = SimConfig::internal(0, 0);
        assert_eq!(config.validate(), Err(SimError::ZeroSize));

        config.size = 0x1000;
        config.erase_unit = 0x300;
        assert_eq!(
            config.validate(),
            Err(SimError::InvalidEraseUnit {
                unit: 0x300,
                size: 0x1000
            })
        );

        config.erase_unit = 0x2000;
        assert!(config.validate().is_err());

        config.erase_unit = 0x200;
        config.write_align = 0;
        assert_eq!(config.validate(), Err(SimError::InvalidWriteAlign(0)));

        let config = SimConfig::internal(0xFFFF_F000, 0x2000);
        assert_eq!(
            config.validate(),
            Err(SimError::AddressOverflow {
                base: 0xFFFF_F000,
                size: 0x2000
            })
        );
    }
}
