//! Intel 8086 CPU core implementation
//!
//! A cycle-counted 8086 interpreter generic over a [`Memory8086`] bus. Each
//! call to [`Cpu8086::step`] runs one instruction cycle:
//!
//! 1. deliver the single-step trap (TF was set when the previous instruction
//!    started) or a pending external request (IF)
//! 2. scan segment-override and repeat prefixes
//! 3. refill the six-byte prefetch queue and fetch the opcode
//! 4. look the opcode up in the dispatch table and fetch its operands
//! 5. run the handler (repeatedly for REP-prefixed string primitives)
//! 6. drain the clock into the timer hook in fixed quanta
//!
//! Decode failures are fatal and leave the machine exactly as it was before
//! the failing instruction.

pub mod alu;
pub mod clock;
pub mod config;
pub mod decode;
pub mod error;
pub mod execute;
pub mod flags;
pub mod interrupt;
pub mod memory;
pub mod opcodes;
pub mod operand;
pub mod prefetch;
pub mod registers;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use clock::{Clock, TimerHook};
pub use config::{AddressPolicy, CpuConfig};
pub use decode::{Instruction, ModRm, RepeatMode};
pub use error::CpuError;
pub use flags::{
    Flags, FLAG_AF, FLAG_CF, FLAG_DF, FLAG_IF, FLAG_MASK, FLAG_OF, FLAG_PF, FLAG_SF, FLAG_TF, FLAG_ZF,
};
pub use interrupt::{VECTOR_BREAKPOINT, VECTOR_DIVIDE, VECTOR_OVERFLOW, VECTOR_TRAP};
pub use memory::{effective_address, ArrayMemory, Memory8086, ADDRESS_MASK, MEMORY_SIZE};
pub use opcodes::{Flow, Handler, ImmRule, OpClass, OpcodeEntry, OperandRule, Timing, WidthRule};
pub use operand::{Operand, Width};
pub use prefetch::{PrefetchQueue, QUEUE_SIZE};
pub use registers::{RegisterFile, SegmentRegisters};
pub use snapshot::RegisterSnapshot;

use crate::logging::{log, LogCategory, LogLevel};
use crate::Cpu;

/// Result of [`Cpu8086::run_bounded`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// HLT reached; `steps` counts the halting step
    Halted { steps: u64 },
    /// The step budget ran out first
    StepLimit,
}

/// Intel 8086 CPU state and execution engine
pub struct Cpu8086<M: Memory8086> {
    /// General purpose, pointer and index registers plus IP
    pub regs: RegisterFile,
    /// CS, DS, SS, ES
    pub segs: SegmentRegisters,
    pub flags: Flags,
    /// Memory bus
    pub memory: M,

    config: CpuConfig,
    clock: Clock,
    queue: PrefetchQueue,
    table: Vec<Option<OpcodeEntry<M>>>,
    timer: Option<Box<dyn TimerHook>>,

    // Per-instruction decode state
    segment_override: Option<u8>,
    repeat: RepeatMode,
    pending_interrupt: Option<u8>,
    /// TF was set when the last instruction started
    trap_pending: bool,
    /// Where the current opcode byte was fetched (after any prefixes)
    opcode_cs: u16,
    opcode_ip: u16,
}

impl<M: Memory8086 + std::fmt::Debug> std::fmt::Debug for Cpu8086<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu8086")
            .field("regs", &self.regs)
            .field("segs", &self.segs)
            .field("flags", &self.flags)
            .field("memory", &self.memory)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("queue", &self.queue)
            .field("timer", &self.timer.is_some())
            .field("pending_interrupt", &self.pending_interrupt)
            .field("trap_pending", &self.trap_pending)
            .finish_non_exhaustive()
    }
}

impl<M: Memory8086> Cpu8086<M> {
    /// Create a CPU in the reset state with the default configuration
    pub fn new(memory: M) -> Self {
        Self::with_config(memory, CpuConfig::default())
    }

    pub fn with_config(memory: M, config: CpuConfig) -> Self {
        let mut cpu = Self {
            regs: RegisterFile::new(),
            segs: SegmentRegisters::default(),
            flags: Flags::default(),
            memory,
            clock: Clock::new(config.clock_quantum),
            config,
            queue: PrefetchQueue::new(),
            table: opcodes::build_table(),
            timer: None,
            segment_override: None,
            repeat: RepeatMode::None,
            pending_interrupt: None,
            trap_pending: false,
            opcode_cs: 0,
            opcode_ip: 0,
        };
        cpu.reset();
        cpu
    }

    /// Power-on state: registers and flags zero, CS = 0xFFFF, memory
    /// cleared, clock and prefetch queue empty, no latched prefix or
    /// request. Installed opcodes and the timer hook are kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.segs.reset();
        self.flags = Flags::default();
        self.memory.clear();
        self.clock.reset();
        self.queue.reset();
        self.segment_override = None;
        self.repeat = RepeatMode::None;
        self.pending_interrupt = None;
        self.trap_pending = false;
        self.opcode_cs = 0;
        self.opcode_ip = 0;
        log(LogCategory::CPU, LogLevel::Info, || "CPU reset".to_string());
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Undrained clock balance. Below the quantum after any step that did
    /// not halt.
    pub fn clock(&self) -> u64 {
        self.clock.balance()
    }

    /// Every cycle charged since reset
    pub fn total_cycles(&self) -> u64 {
        self.clock.total()
    }

    /// Timer ticks delivered since reset
    pub fn timer_ticks(&self) -> u64 {
        self.clock.ticks()
    }

    /// Add cycles to the clock
    #[inline]
    pub fn charge(&mut self, cycles: u32) {
        self.clock.charge(cycles);
    }

    #[inline]
    pub fn get_flag(&self, flag: u16) -> bool {
        self.flags.get(flag)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u16, value: bool) {
        self.flags.set(flag, value);
    }

    /// Install the callback invoked once per clock quantum
    pub fn set_timer_hook(&mut self, hook: Box<dyn TimerHook>) {
        self.timer = Some(hook);
    }

    pub fn clear_timer_hook(&mut self) {
        self.timer = None;
    }

    /// Dispatch entry for `opcode`
    pub fn opcode(&self, opcode: u8) -> Option<&OpcodeEntry<M>> {
        self.table[opcode as usize].as_ref()
    }

    /// Add or replace the dispatch entry for `opcode`
    pub fn install_opcode(&mut self, opcode: u8, entry: OpcodeEntry<M>) {
        log(LogCategory::CPU, LogLevel::Debug, || {
            format!("Installing {} at opcode {:02X}", entry.mnemonic, opcode)
        });
        self.table[opcode as usize] = Some(entry);
    }

    /// Copy `image` to CS:`offset` and point IP at its first byte
    pub fn load(&mut self, offset: u16, image: &[u8]) {
        let base = effective_address(self.segs.cs, offset);
        for (i, &byte) in image.iter().enumerate() {
            self.write_byte(base + i as u32, byte);
        }
        self.regs.ip = offset;
        log(LogCategory::Bus, LogLevel::Info, || {
            format!(
                "Loaded {} bytes at {:04X}:{:04X} ({:05X})",
                image.len(),
                self.segs.cs,
                offset,
                base & ADDRESS_MASK
            )
        });
    }

    /// Decode error for `opcode` at the CS:IP of the current opcode fetch
    pub fn decode_error(&self, opcode: u8) -> CpuError {
        CpuError::Decode {
            opcode,
            cs: self.opcode_cs,
            ip: self.opcode_ip,
            snapshot: Box::new(self.snapshot()),
        }
    }

    /// Execute one instruction cycle.
    ///
    /// Returns `Ok(false)` when the instruction was HLT; IP then stays on
    /// the HLT opcode and only the clock has advanced. On error every
    /// register, the flags, the clock and the interrupt latches are restored
    /// to their state before the step, so an interrupt delivered in the same
    /// step is delivered again next time. The frame it pushed is left in
    /// memory below SP.
    pub fn step(&mut self) -> Result<bool, CpuError> {
        let checkpoint = self.snapshot();
        let latches = (self.pending_interrupt, self.trap_pending);

        let result = self.service_interrupts().and_then(|_| {
            self.trap_pending = self.flags.trap();
            self.execute_instruction()
        });
        self.segment_override = None;
        self.repeat = RepeatMode::None;

        match result {
            Ok(Flow::Continue) => {
                self.drain_clock();
                Ok(true)
            }
            // The halt cost stays in the balance
            Ok(Flow::Halt) => Ok(false),
            Err(err) => {
                self.restore(&checkpoint);
                (self.pending_interrupt, self.trap_pending) = latches;
                let err = match err {
                    CpuError::Decode { opcode, .. } => self.decode_error(opcode),
                    other => other,
                };
                log(LogCategory::CPU, LogLevel::Error, || err.to_string());
                Err(err)
            }
        }
    }

    /// Step until HLT or an error
    pub fn run(&mut self) -> Result<(), CpuError> {
        while self.step()? {}
        Ok(())
    }

    /// Step until HLT, an error, or `max_steps` steps
    pub fn run_bounded(&mut self, max_steps: u64) -> Result<RunOutcome, CpuError> {
        for steps in 1..=max_steps {
            if !self.step()? {
                return Ok(RunOutcome::Halted { steps });
            }
        }
        Ok(RunOutcome::StepLimit)
    }

    fn execute_instruction(&mut self) -> Result<Flow, CpuError> {
        let start_ip = self.regs.ip;
        self.scan_prefixes()?;

        self.refill_queue();
        self.opcode_cs = self.segs.cs;
        self.opcode_ip = self.regs.ip;
        let opcode = self.fetch_u8()?;

        let Some(entry) = self.table[opcode as usize] else {
            return Err(self.decode_error(opcode));
        };
        if entry.class == OpClass::Normal {
            self.repeat = RepeatMode::None;
        }
        let instr = self.decode_operands(opcode, entry.width, entry.operands)?;

        log(LogCategory::CPU, LogLevel::Trace, || {
            let segment = self.segment_override.map_or("", SegmentRegisters::name);
            format!(
                "{:04X}:{:04X} {:02X} {:<2} {:<6} AX={:04X} BX={:04X} CX={:04X} DX={:04X} SP={:04X} FL={:04X}",
                self.opcode_cs,
                self.opcode_ip,
                opcode,
                segment,
                entry.mnemonic,
                self.regs.ax(),
                self.regs.bx(),
                self.regs.cx(),
                self.regs.dx(),
                self.regs.sp(),
                self.flags.bits()
            )
        });

        let flags_before = self.flags.bits();
        let flow = match entry.class {
            OpClass::Normal => {
                if let Some(timing) = entry.timing {
                    let cycles = if instr.has_memory_operand() {
                        timing.memory + instr.ea_cycles
                    } else {
                        timing.register
                    };
                    self.charge(cycles);
                }
                (entry.handler)(self, &instr)?
            }
            OpClass::String { compare, single } => self.run_string(&entry, &instr, compare, single)?,
        };
        debug_assert!(
            entry.affects_flags || self.flags.bits() == flags_before,
            "{} ({:02X}) changed FLAGS",
            entry.mnemonic,
            opcode
        );

        if flow == Flow::Halt {
            self.regs.ip = start_ip;
        }
        Ok(flow)
    }

    /// Consume segment-override and repeat prefixes at CS:IP
    fn scan_prefixes(&mut self) -> Result<(), CpuError> {
        self.segment_override = None;
        self.repeat = RepeatMode::None;
        loop {
            let byte = self.read_at(Width::Byte, self.segs.cs, self.regs.ip)? as u8;
            match byte {
                // ES: CS: SS: DS:
                0x26 | 0x2E | 0x36 | 0x3E => {
                    self.segment_override = Some((byte >> 3) & 0x03);
                    self.charge(2);
                }
                0xF2 => {
                    self.repeat = RepeatMode::WhileNotEqual;
                    self.charge(9);
                }
                0xF3 => {
                    self.repeat = RepeatMode::WhileEqual;
                    self.charge(9);
                }
                _ => return Ok(()),
            }
            self.regs.ip = self.regs.ip.wrapping_add(1);
        }
    }

    /// Run a string primitive once, or CX times under a repeat prefix
    fn run_string(
        &mut self,
        entry: &OpcodeEntry<M>,
        instr: &Instruction,
        compare: bool,
        single: u32,
    ) -> Result<Flow, CpuError> {
        if instr.repeat == RepeatMode::None {
            self.charge(single);
            return (entry.handler)(self, instr);
        }

        let per_iteration = entry.timing.map_or(0, |t| t.register);
        while self.regs.cx() != 0 {
            let cx = self.regs.cx() - 1;
            self.regs.set_word_reg(registers::CX, cx as u32);
            (entry.handler)(self, instr)?;
            self.charge(per_iteration);
            self.drain_clock();

            let done = compare
                && match instr.repeat {
                    RepeatMode::WhileEqual => !self.flags.zero(),
                    RepeatMode::WhileNotEqual => self.flags.zero(),
                    RepeatMode::None => false,
                };
            if done {
                break;
            }
        }
        Ok(Flow::Continue)
    }

    fn drain_clock(&mut self) {
        let timer = &mut self.timer;
        self.clock.drain(|| {
            if let Some(hook) = timer.as_mut() {
                hook.tick();
            }
        });
    }
}

impl<M: Memory8086> Cpu for Cpu8086<M> {
    type Error = CpuError;

    fn reset(&mut self) {
        Cpu8086::reset(self)
    }

    fn step(&mut self) -> Result<bool, CpuError> {
        Cpu8086::step(self)
    }
}
