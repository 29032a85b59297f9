//! Worker capacity resolution.
//!
//! A worker's capacity (the number of jobs it runs simultaneously) is
//! derived once at startup from one of five strategies. The `--max-jobs`
//! flag encodes them as: positive integer = explicit cap, `-1` = physical
//! cores, `-2` = logical cores, `-3` = physical minus one, `-4` = logical
//! minus one.

use crate::error::{LrtsError, Result};

/// Strategy for deriving a worker's maximum simultaneous job count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMode {
    Explicit(u32),
    PhysicalCores,
    LogicalCores,
    PhysicalCoresMinusOne,
    LogicalCoresMinusOne,
}

impl CapacityMode {
    /// Decode the CLI flag value.
    pub fn from_flag(value: i64) -> Result<Self> {
        match value {
            n if n > 0 => Ok(CapacityMode::Explicit(n as u32)),
            -1 => Ok(CapacityMode::PhysicalCores),
            -2 => Ok(CapacityMode::LogicalCores),
            -3 => Ok(CapacityMode::PhysicalCoresMinusOne),
            -4 => Ok(CapacityMode::LogicalCoresMinusOne),
            other => Err(LrtsError::InvalidCapacity(other)),
        }
    }

    /// Resolve the mode to a concrete capacity using the given probe.
    ///
    /// Physical core detection is not reliable on every platform; when
    /// the probe reports no physical cores, the logical count is used
    /// instead and a warning is logged. The result is always at least 1.
    pub fn resolve(&self, probe: &dyn CoreCountProbe) -> u32 {
        let capacity = match self {
            CapacityMode::Explicit(n) => *n,
            CapacityMode::PhysicalCores => self.physical_or_fallback(probe),
            CapacityMode::LogicalCores => probe.logical_cores(),
            CapacityMode::PhysicalCoresMinusOne => {
                self.physical_or_fallback(probe).saturating_sub(1)
            }
            CapacityMode::LogicalCoresMinusOne => probe.logical_cores().saturating_sub(1),
        };
        capacity.max(1)
    }

    fn physical_or_fallback(&self, probe: &dyn CoreCountProbe) -> u32 {
        match probe.physical_cores() {
            Some(n) if n > 0 => n,
            _ => {
                let logical = probe.logical_cores();
                tracing::warn!(
                    logical,
                    "Physical core detection failed, falling back to logical core count"
                );
                logical
            }
        }
    }
}

/// CPU topology query, abstracted so capacity resolution is testable on
/// hosts with arbitrary core counts.
pub trait CoreCountProbe {
    /// Physical core count, or `None` when the platform cannot report it.
    fn physical_cores(&self) -> Option<u32>;
    fn logical_cores(&self) -> u32;
}

/// Probe backed by the host's actual CPU topology.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCoreCount;

impl CoreCountProbe for SystemCoreCount {
    fn physical_cores(&self) -> Option<u32> {
        let n = num_cpus::get_physical();
        if n > 0 {
            Some(n as u32)
        } else {
            None
        }
    }

    fn logical_cores(&self) -> u32 {
        num_cpus::get().max(1) as u32
    }
}
