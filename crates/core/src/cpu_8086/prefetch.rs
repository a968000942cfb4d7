//! Bus interface unit instruction queue
//!
//! The queue holds up to six bytes starting at CS:IP. It is rebuilt from
//! memory at the start of every instruction, so it never goes stale and
//! needs no invalidation. Decode consumes bytes from the front; anything
//! past the six-byte window is read straight from memory.

use super::memory::{effective_address, Memory8086};
use super::Cpu8086;

/// Queue depth of the 8086 bus interface unit
pub const QUEUE_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchQueue {
    bytes: [u8; QUEUE_SIZE],
    head: usize,
    len: usize,
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all queued bytes
    pub fn reset(&mut self) {
        self.bytes = [0; QUEUE_SIZE];
        self.head = 0;
        self.len = 0;
    }

    /// Refill from a byte source; `fetch(i)` returns the byte at IP+i or
    /// `None` when it cannot be fetched, which ends the fill early.
    pub fn fill<F>(&mut self, mut fetch: F)
    where
        F: FnMut(usize) -> Option<u8>,
    {
        self.head = 0;
        self.len = 0;
        for i in 0..QUEUE_SIZE {
            match fetch(i) {
                Some(byte) => {
                    self.bytes[i] = byte;
                    self.len += 1;
                }
                None => break,
            }
        }
    }

    /// Next byte without consuming it
    #[inline]
    pub fn front(&self) -> Option<u8> {
        (self.head < self.len).then(|| self.bytes[self.head])
    }

    /// Consume the next byte
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        let byte = self.front()?;
        self.head += 1;
        Some(byte)
    }

    /// Bytes still queued
    #[inline]
    pub fn len(&self) -> usize {
        self.len - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining queued bytes, front first
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.head..self.len]
    }
}

impl<M: Memory8086> Cpu8086<M> {
    /// Reload the queue from the six bytes at CS:IP
    pub(crate) fn refill_queue(&mut self) {
        let (cs, ip) = (self.segs.cs, self.regs.ip);
        let mut queue = self.queue;
        queue.fill(|i| {
            let address = effective_address(cs, ip.wrapping_add(i as u16));
            self.translate(address).ok().map(|addr| self.memory.read(addr))
        });
        self.queue = queue;
    }

    /// Current contents of the prefetch queue
    pub fn prefetch_queue(&self) -> &PrefetchQueue {
        &self.queue
    }
}
