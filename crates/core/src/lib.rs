//! Cycle-counted Intel 8086 emulator core.

pub mod cpu_8086;
pub mod logging;

pub use cpu_8086::{ArrayMemory, Cpu8086, CpuConfig, CpuError, Memory8086, RegisterSnapshot, RunOutcome};

/// A CPU-like component that can be stepped one instruction at a time.
pub trait Cpu {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return to the power-on state
    fn reset(&mut self);

    /// Execute one instruction; `Ok(false)` means the CPU halted.
    fn step(&mut self) -> Result<bool, Self::Error>;

    /// Step until halted or an error occurs
    fn run(&mut self) -> Result<(), Self::Error> {
        while self.step()? {}
        Ok(())
    }
}
