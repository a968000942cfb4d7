//! Physical memory, segment:offset translation and the CPU's data accessors

use super::config::AddressPolicy;
use super::error::CpuError;
use super::operand::Width;
use super::registers::SP;
use super::Cpu8086;
use crate::logging::{log, LogCategory, LogLevel};

/// Size of the 8086 physical address space (1 MiB)
pub const MEMORY_SIZE: usize = 0x10_0000;

/// Highest valid physical address
pub const ADDRESS_MASK: u32 = 0xF_FFFF;

/// Extra cycles for a word access at an odd address
pub const ODD_WORD_PENALTY: u32 = 4;

/// Memory interface trait for the 8086 CPU
///
/// Addresses handed to implementations are always within `0..MEMORY_SIZE`;
/// the CPU applies its [`AddressPolicy`] before calling in.
pub trait Memory8086 {
    /// Read a byte from memory at the given address
    fn read(&self, addr: u32) -> u8;

    /// Write a byte to memory at the given address
    fn write(&mut self, addr: u32, val: u8);

    /// Zero the whole store (machine reset)
    fn clear(&mut self);
}

/// Physical address for `segment:offset`: `(segment << 4) + offset`
///
/// The result is not masked; 0xFFFF:0x0010 yields 0x100000.
#[inline]
pub fn effective_address(segment: u16, offset: u16) -> u32 {
    ((segment as u32) << 4) + (offset as u32)
}

/// Flat 1 MiB byte store
#[derive(Clone)]
pub struct ArrayMemory {
    data: Vec<u8>,
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self {
            data: vec![0; MEMORY_SIZE],
        }
    }

    /// Copy `image` to consecutive physical addresses starting at `addr`.
    /// Bytes that would land past the end of memory are dropped.
    pub fn load(&mut self, addr: u32, image: &[u8]) {
        let start = (addr as usize).min(MEMORY_SIZE);
        let end = (start + image.len()).min(MEMORY_SIZE);
        self.data[start..end].copy_from_slice(&image[..end - start]);
    }

    /// The whole physical address space
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Read a 16-bit word from memory (little-endian)
    pub fn read_u16(&self, addr: u32) -> u16 {
        let low = self.read(addr);
        let high = self.read(addr + 1);
        (high as u16) << 8 | low as u16
    }

    /// Write a 16-bit word to memory (little-endian)
    pub fn write_u16(&mut self, addr: u32, val: u16) {
        self.write(addr, (val & 0xFF) as u8);
        self.write(addr + 1, ((val >> 8) & 0xFF) as u8);
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ArrayMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayMemory")
            .field("size", &self.data.len())
            .finish()
    }
}

impl Memory8086 for ArrayMemory {
    fn read(&self, addr: u32) -> u8 {
        self.data.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn write(&mut self, addr: u32, val: u8) {
        if let Some(cell) = self.data.get_mut(addr as usize) {
            *cell = val;
        }
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl<M: Memory8086> Cpu8086<M> {
    /// Apply the address policy to a raw physical address
    #[inline]
    pub(crate) fn translate(&self, address: u32) -> Result<u32, CpuError> {
        if address <= ADDRESS_MASK {
            return Ok(address);
        }
        match self.config.address_policy {
            AddressPolicy::Wrap => {
                log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("Address {:06X} wrapped to {:05X}", address, address & ADDRESS_MASK)
                });
                Ok(address & ADDRESS_MASK)
            }
            AddressPolicy::Strict => Err(CpuError::Address { address }),
        }
    }

    /// Read a byte or little-endian word at a physical address.
    ///
    /// A word read at an odd address costs the configured penalty.
    pub fn read(&mut self, width: Width, address: u32) -> Result<u32, CpuError> {
        let low = self.memory.read(self.translate(address)?) as u32;
        match width {
            Width::Byte => Ok(low),
            Width::Word => {
                if address & 1 == 1 {
                    self.clock.charge(self.config.odd_word_penalty);
                }
                let high = self.memory.read(self.translate(address + 1)?) as u32;
                Ok(high << 8 | low)
            }
        }
    }

    /// Write a byte or little-endian word at a physical address.
    ///
    /// The value is masked to `width`; a word write at an odd address costs
    /// the configured penalty.
    pub fn write(&mut self, width: Width, address: u32, value: u32) -> Result<(), CpuError> {
        let value = value & width.mask();
        let low_addr = self.translate(address)?;
        match width {
            Width::Byte => self.memory.write(low_addr, value as u8),
            Width::Word => {
                let high_addr = self.translate(address + 1)?;
                if address & 1 == 1 {
                    self.clock.charge(self.config.odd_word_penalty);
                }
                self.memory.write(low_addr, value as u8);
                self.memory.write(high_addr, (value >> 8) as u8);
            }
        }
        Ok(())
    }

    /// Read using segment:offset
    #[inline]
    pub fn read_at(&mut self, width: Width, segment: u16, offset: u16) -> Result<u32, CpuError> {
        self.read(width, effective_address(segment, offset))
    }

    /// Write using segment:offset
    #[inline]
    pub fn write_at(
        &mut self,
        width: Width,
        segment: u16,
        offset: u16,
        value: u32,
    ) -> Result<(), CpuError> {
        self.write(width, effective_address(segment, offset), value)
    }

    /// Loader primitive: store one byte at a physical address.
    ///
    /// Addresses wrap at 1 MiB. No cycles are charged.
    pub fn write_byte(&mut self, address: u32, value: u8) {
        self.memory.write(address & ADDRESS_MASK, value);
    }

    /// Inspect one byte at a physical address without charging cycles
    pub fn peek_byte(&self, address: u32) -> u8 {
        self.memory.read(address & ADDRESS_MASK)
    }

    /// Inspect a little-endian word at a physical address without charging cycles
    pub fn peek_word(&self, address: u32) -> u16 {
        let low = self.peek_byte(address) as u16;
        let high = self.peek_byte(address + 1) as u16;
        (high << 8) | low
    }

    /// Push a word onto the stack at SS:SP
    pub fn push(&mut self, value: u16) -> Result<(), CpuError> {
        let sp = self.regs.sp().wrapping_sub(2);
        self.regs.set_word_reg(SP, sp as u32);
        self.write_at(Width::Word, self.segs.ss, sp, value as u32)
    }

    /// Pop a word from the stack at SS:SP
    pub fn pop(&mut self) -> Result<u16, CpuError> {
        let sp = self.regs.sp();
        let value = self.read_at(Width::Word, self.segs.ss, sp)? as u16;
        self.regs.set_word_reg(SP, sp.wrapping_add(2) as u32);
        Ok(value)
    }
}
