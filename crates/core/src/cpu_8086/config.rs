//! Tunable CPU parameters

use serde::{Deserialize, Serialize};

use super::memory::ODD_WORD_PENALTY;

/// How physical addresses above 0xFFFFF are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressPolicy {
    /// Mask to 20 bits like the real 8086 (0x100000 -> 0x00000)
    #[default]
    Wrap,
    /// Abort the instruction with `CpuError::Address`
    Strict,
}

/// CPU configuration
///
/// Loaded by hosts from JSON; every field is optional and falls back to the
/// 8086 defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Address wraparound behaviour at the 1 MiB boundary
    pub address_policy: AddressPolicy,
    /// Cycles per external timer tick
    pub clock_quantum: u32,
    /// Extra cycles for a word access at an odd address
    pub odd_word_penalty: u32,
    /// Cost of delivering the single-step trap
    pub trap_cycles: u32,
    /// Cost of delivering an external interrupt request
    pub interrupt_cycles: u32,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            address_policy: AddressPolicy::Wrap,
            clock_quantum: 4,
            odd_word_penalty: ODD_WORD_PENALTY,
            trap_cycles: 50,
            interrupt_cycles: 61,
        }
    }
}
