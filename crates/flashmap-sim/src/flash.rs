//! In-memory flash device

use flashmap_core::{DriverError, FlashDriver};
use log::{debug, trace};

use crate::config::SimConfig;
use crate::error::SimError;

/// Driver operation kinds, used for fault injection and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Read
    Read,
    /// Program
    Write,
    /// Erase
    Erase,
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Successful reads
    pub reads: usize,
    /// Successful program operations
    pub writes: usize,
    /// Successful erase operations
    pub erases: usize,
    /// Bytes programmed
    pub bytes_written: usize,
    /// Bytes erased
    pub bytes_erased: usize,
}

/// Simulated flash device
///
/// Programming follows NOR semantics: it can only move bits away from the
/// erased state, so writing over data that was not erased first combines the
/// old and new values instead of replacing them.
#[derive(Debug, Clone)]
pub struct SimFlash {
    config: SimConfig,
    data: Vec<u8>,
    stats: SimStats,
    fault: Option<Op>,
}

impl SimFlash {
    /// Create a new erased device with the given configuration
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let data = vec![config.erased_value; config.size as usize];
        Ok(Self {
            config,
            data,
            stats: SimStats::default(),
            fault: None,
        })
    }

    /// Create a device with pre-filled contents
    ///
    /// Bytes past the end of `initial_data` are erased.
    pub fn with_data(config: SimConfig, initial_data: &[u8]) -> Result<Self, SimError> {
        if initial_data.len() > config.size as usize {
            return Err(SimError::DataTooLarge {
                len: initial_data.len(),
                size: config.size,
            });
        }
        let mut flash = Self::new(config)?;
        flash.data[..initial_data.len()].copy_from_slice(initial_data);
        Ok(flash)
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Operation counters
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Make the next operation of the given kind fail
    pub fn fail_next(&mut self, op: Op) {
        self.fault = Some(op);
    }

    fn take_fault(&mut self, op: Op) -> bool {
        if self.fault == Some(op) {
            self.fault = None;
            true
        } else {
            false
        }
    }

    /// Device-local byte range of an access, if it lies inside the device
    fn range(&self, addr: u32, len: usize) -> Option<core::ops::Range<usize>> {
        let start = addr.checked_sub(self.config.base)? as usize;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some(start..end)
    }

    fn program(&mut self, range: core::ops::Range<usize>, data: &[u8]) {
        let erased_high = self.config.erased_value == 0xFF;
        for (cell, &byte) in self.data[range].iter_mut().zip(data) {
            if erased_high {
                *cell &= byte;
            } else {
                *cell |= byte;
            }
        }
    }
}

impl FlashDriver for SimFlash {
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), DriverError> {
        let range = self.range(addr, buf.len());
        let range = match range {
            Some(range) if !self.take_fault(Op::Read) => range,
            _ => {
                debug!("sim: read of {} bytes at 0x{:08X} failed", buf.len(), addr);
                return Err(DriverError::ReadFailed { addr });
            }
        };
        buf.copy_from_slice(&self.data[range]);
        self.stats.reads += 1;
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), DriverError> {
        let align = self.config.write_align;
        if addr % align != 0 || data.len() % align as usize != 0 {
            debug!("sim: misaligned write at 0x{:08X}", addr);
            return Err(DriverError::Misaligned { addr });
        }
        let range = self.range(addr, data.len());
        let range = match range {
            Some(range) if !self.take_fault(Op::Write) => range,
            _ => {
                debug!("sim: {} byte write at 0x{:08X} failed", data.len(), addr);
                return Err(DriverError::WriteFailed { addr });
            }
        };
        trace!("sim: program {} bytes at 0x{:08X}", data.len(), addr);
        self.program(range, data);
        self.stats.writes += 1;
        self.stats.bytes_written += data.len();
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<(), DriverError> {
        let unit = self.config.erase_unit;
        if addr.wrapping_sub(self.config.base) % unit != 0 || len % unit != 0 {
            debug!("sim: misaligned erase of {} bytes at 0x{:08X}", len, addr);
            return Err(DriverError::Misaligned { addr });
        }
        let range = self.range(addr, len as usize);
        let range = match range {
            Some(range) if !self.take_fault(Op::Erase) => range,
            _ => {
                debug!("sim: erase of {} bytes at 0x{:08X} failed", len, addr);
                return Err(DriverError::EraseFailed { addr });
            }
        };
        trace!("sim: erase {} bytes at 0x{:08X}", len, addr);
        let erased = self.config.erased_value;
        self.data[range].fill(erased);
        self.stats.erases += 1;
        self.stats.bytes_erased += len as usize;
        Ok(())
    }

    fn erase_unit(&self) -> u32 {
        self.config.erase_unit
    }

    fn write_align(&self) -> u32 {
        self.config.write_align
    }

    fn physical_address(&self, area_base: u32, offset: u32) -> u32 {
        match self.config.window {
            Some(window) => area_base
                .wrapping_sub(window)
                .wrapping_add(self.config.base)
                .wrapping_add(offset),
            None => area_base.wrapping_add(offset),
        }
    }
}
