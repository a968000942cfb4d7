//! Serializable register snapshot for error reports and save states

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::flags::Flags;
use super::memory::Memory8086;
use super::registers::{AX, BP, BX, CX, DI, DX, SI, SP};
use super::Cpu8086;

/// Every architectural register plus the cycle counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub sp: u16,
    pub bp: u16,
    pub si: u16,
    pub di: u16,
    pub ip: u16,
    pub cs: u16,
    pub ds: u16,
    pub ss: u16,
    pub es: u16,
    pub flags: u16,
    /// Undrained clock balance
    pub clock: u64,
    pub total_cycles: u64,
}

impl<M: Memory8086> Cpu8086<M> {
    /// Capture the current register state
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            ax: self.regs.ax(),
            bx: self.regs.bx(),
            cx: self.regs.cx(),
            dx: self.regs.dx(),
            sp: self.regs.sp(),
            bp: self.regs.bp(),
            si: self.regs.si(),
            di: self.regs.di(),
            ip: self.regs.ip,
            cs: self.segs.cs,
            ds: self.segs.ds,
            ss: self.segs.ss,
            es: self.segs.es,
            flags: self.flags.bits(),
            clock: self.clock.balance(),
            total_cycles: self.clock.total(),
        }
    }

    /// Restore registers and counters from a snapshot (memory is untouched)
    pub fn restore(&mut self, snapshot: &RegisterSnapshot) {
        for (code, value) in [
            (AX, snapshot.ax),
            (CX, snapshot.cx),
            (DX, snapshot.dx),
            (BX, snapshot.bx),
            (SP, snapshot.sp),
            (BP, snapshot.bp),
            (SI, snapshot.si),
            (DI, snapshot.di),
        ] {
            self.regs.set_word_reg(code, value as u32);
        }
        self.regs.ip = snapshot.ip;
        self.segs.cs = snapshot.cs;
        self.segs.ds = snapshot.ds;
        self.segs.ss = snapshot.ss;
        self.segs.es = snapshot.es;
        self.flags = Flags::from_bits(snapshot.flags);
        self.clock.restore(snapshot.clock, snapshot.total_cycles);
    }

    /// Return a JSON save state.
    /// Note: memory is not included, only CPU state.
    pub fn save_state(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }

    /// Load a JSON save state produced by [`Cpu8086::save_state`]
    pub fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        let snapshot = RegisterSnapshot::deserialize(v)?;
        self.restore(&snapshot);
        Ok(())
    }
}
