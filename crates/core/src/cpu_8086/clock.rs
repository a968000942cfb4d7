//! Cycle accounting and the external timer tick hook

use crate::logging::{log, LogCategory, LogLevel};

/// Receiver for timer ticks (e.g. a programmable interval timer).
///
/// Called inline on the execution hot path, so implementations must be
/// fast and must not block.
pub trait TimerHook {
    fn tick(&mut self);
}

impl<F: FnMut()> TimerHook for F {
    fn tick(&mut self) {
        self()
    }
}

/// Cycle counter drained in fixed quanta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    /// Cycles accumulated but not yet handed to the timer
    balance: u64,
    /// Every cycle ever charged since reset
    total: u64,
    /// Timer ticks delivered since reset
    ticks: u64,
    quantum: u32,
}

impl Clock {
    pub fn new(quantum: u32) -> Self {
        Self {
            balance: 0,
            total: 0,
            ticks: 0,
            quantum: quantum.max(1),
        }
    }

    pub fn reset(&mut self) {
        self.balance = 0;
        self.total = 0;
        self.ticks = 0;
    }

    #[inline]
    pub fn charge(&mut self, cycles: u32) {
        self.balance += cycles as u64;
        self.total += cycles as u64;
    }

    #[inline]
    pub fn balance(&self) -> u64 {
        self.balance
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn restore(&mut self, balance: u64, total: u64) {
        self.balance = balance;
        self.total = total;
    }

    /// Call `on_tick` once per complete quantum; returns the number of ticks
    pub fn drain<F: FnMut()>(&mut self, mut on_tick: F) -> u64 {
        let quantum = self.quantum as u64;
        let mut delivered = 0;
        while self.balance >= quantum {
            self.balance -= quantum;
            delivered += 1;
            on_tick();
        }
        if delivered > 0 {
            self.ticks += delivered;
            log(LogCategory::Timer, LogLevel::Trace, || {
                format!("Timer: {} tick(s), {} cycles pending", delivered, self.balance)
            });
        }
        delivered
    }
}
