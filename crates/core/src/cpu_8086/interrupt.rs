//! Interrupt delivery and return

use crate::logging::{log, LogCategory, LogLevel};

use super::error::CpuError;
use super::flags::{FLAG_IF, FLAG_MASK, FLAG_TF};
use super::memory::Memory8086;
use super::operand::Width;
use super::Cpu8086;

/// Divide error (DIV/IDIV by zero or quotient overflow)
pub const VECTOR_DIVIDE: u8 = 0;
/// Single-step trap
pub const VECTOR_TRAP: u8 = 1;
pub const VECTOR_BREAKPOINT: u8 = 3;
pub const VECTOR_OVERFLOW: u8 = 4;

impl<M: Memory8086> Cpu8086<M> {
    /// Deliver interrupt `vector`.
    ///
    /// Pushes FLAGS, CS and IP (SP drops by 6), clears IF and TF, then loads
    /// IP from `0000:vector*4` and CS from `0000:vector*4+2`. The saved IP is
    /// whatever IP holds at the time of the call, normally the next
    /// instruction.
    pub fn raise(&mut self, vector: u8) -> Result<(), CpuError> {
        let (cs, ip) = (self.segs.cs, self.regs.ip);
        self.push(self.flags.bits())?;
        self.flags.set(FLAG_IF, false);
        self.flags.set(FLAG_TF, false);
        self.push(cs)?;
        self.push(ip)?;

        let entry = (vector as u16) * 4;
        let target_ip = self.read_at(Width::Word, 0, entry)? as u16;
        let target_cs = self.read_at(Width::Word, 0, entry.wrapping_add(2))? as u16;
        self.regs.ip = target_ip;
        self.segs.cs = target_cs;

        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!(
                "INT {:02X} from {:04X}:{:04X} -> {:04X}:{:04X}",
                vector, cs, ip, target_cs, target_ip
            )
        });
        Ok(())
    }

    /// IRET: pop IP, CS and FLAGS
    pub fn interrupt_return(&mut self) -> Result<(), CpuError> {
        self.regs.ip = self.pop()?;
        self.segs.cs = self.pop()?;
        let flags = self.pop()?;
        self.flags.set_bits(flags & FLAG_MASK);
        log(LogCategory::Interrupts, LogLevel::Trace, || {
            format!("IRET to {:04X}:{:04X}", self.segs.cs, self.regs.ip)
        });
        Ok(())
    }

    /// Latch a maskable interrupt request. It is delivered at the next
    /// instruction boundary with IF set; a newer request replaces an
    /// undelivered one.
    pub fn request_interrupt(&mut self, vector: u8) {
        if let Some(previous) = self.pending_interrupt.replace(vector) {
            log(LogCategory::Interrupts, LogLevel::Warn, || {
                format!("Pending INT {:02X} replaced by INT {:02X}", previous, vector)
            });
        }
    }

    /// Vector of the undelivered interrupt request, if any
    pub fn pending_interrupt(&self) -> Option<u8> {
        self.pending_interrupt
    }

    pub(crate) fn divide_error(&mut self) -> Result<(), CpuError> {
        log(LogCategory::Interrupts, LogLevel::Debug, || {
            format!("Divide error at {:04X}:{:04X}", self.opcode_cs, self.opcode_ip)
        });
        self.raise(VECTOR_DIVIDE)
    }

    /// Deliver the single-step trap or a pending request before the next
    /// instruction. Returns true if an interrupt was delivered.
    ///
    /// The trap follows every instruction that started with TF set, so a
    /// handler returning with IRET lets exactly one instruction run before
    /// the next trap.
    pub(crate) fn service_interrupts(&mut self) -> Result<bool, CpuError> {
        if std::mem::take(&mut self.trap_pending) {
            self.raise(VECTOR_TRAP)?;
            self.charge(self.config.trap_cycles);
            return Ok(true);
        }
        if self.flags.interrupt_enabled() {
            if let Some(vector) = self.pending_interrupt.take() {
                self.raise(vector)?;
                self.charge(self.config.interrupt_cycles);
                return Ok(true);
            }
        }
        Ok(false)
    }
}
