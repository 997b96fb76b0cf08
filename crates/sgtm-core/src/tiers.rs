//! Fargate CPU/memory tier table and validation.
//!
//! The managed container runtime only accepts specific (cpu, memory)
//! pairings. Small tiers list their memory values explicitly; larger tiers
//! are regularly spaced ranges.
//!
//! ```text
//! cpu     memory (MiB)
//! 256     512, 1024, 2048
//! 512     1024 ..= 4096     step 1024
//! 1024    2048 ..= 8192     step 1024
//! 2048    4096 ..= 16384    step 1024
//! 4096    8192 ..= 30720    step 1024
//! 8192    16384 ..= 61440   step 4096
//! 16384   32768 ..= 122880  step 8192
//! ```
//!
//! The table is a `const` and is never mutated, so validation can run
//! from any thread.

use thiserror::Error;

const GIB: u32 = 1024;

/// Memory values (MiB) allowed for a single CPU tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOptions {
    /// Explicit ascending list.
    List(&'static [u32]),
    /// Inclusive range with a fixed step.
    Stepped { min: u32, max: u32, step: u32 },
}

impl MemoryOptions {
    /// Membership check without materializing the set.
    pub fn contains(&self, memory: u32) -> bool {
        match *self {
            MemoryOptions::List(values) => values.contains(&memory),
            MemoryOptions::Stepped { min, max, step } => {
                (min..=max).contains(&memory) && (memory - min) % step == 0
            }
        }
    }

    /// All allowed values, ascending.
    pub fn values(&self) -> Vec<u32> {
        match *self {
            MemoryOptions::List(values) => values.to_vec(),
            MemoryOptions::Stepped { min, max, step } => {
                (min..=max).step_by(step as usize).collect()
            }
        }
    }

    pub fn min(&self) -> u32 {
        match *self {
            MemoryOptions::List(values) => values.first().copied().unwrap_or(0),
            MemoryOptions::Stepped { min, .. } => min,
        }
    }

    pub fn max(&self) -> u32 {
        match *self {
            MemoryOptions::List(values) => values.last().copied().unwrap_or(0),
            MemoryOptions::Stepped { max, .. } => max,
        }
    }
}

/// A single (cpu, allowed memory) compatibility pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// CPU units (1024 units = 1 vCPU).
    pub cpu: u32,
    pub memory: MemoryOptions,
}

impl Tier {
    pub fn contains(&self, memory: u32) -> bool {
        self.memory.contains(memory)
    }
}

/// Provider-documented tiers, ascending by CPU.
pub const TIERS: &[Tier] = &[
    Tier {
        cpu: 256,
        memory: MemoryOptions::List(&[512, GIB, 2 * GIB]),
    },
    Tier {
        cpu: 512,
        memory: MemoryOptions::Stepped { min: GIB, max: 4 * GIB, step: GIB },
    },
    Tier {
        cpu: 1024,
        memory: MemoryOptions::Stepped { min: 2 * GIB, max: 8 * GIB, step: GIB },
    },
    Tier {
        cpu: 2048,
        memory: MemoryOptions::Stepped { min: 4 * GIB, max: 16 * GIB, step: GIB },
    },
    Tier {
        cpu: 4096,
        memory: MemoryOptions::Stepped { min: 8 * GIB, max: 30 * GIB, step: GIB },
    },
    Tier {
        cpu: 8192,
        memory: MemoryOptions::Stepped { min: 16 * GIB, max: 60 * GIB, step: 4 * GIB },
    },
    Tier {
        cpu: 16384,
        memory: MemoryOptions::Stepped { min: 32 * GIB, max: 120 * GIB, step: 8 * GIB },
    },
];

/// Errors produced by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    #[error("given CPU '{cpu}' not in allowed list [{}]", join(.allowed_cpus))]
    InvalidCpuTier { cpu: u32, allowed_cpus: Vec<u32> },

    #[error("given memory '{memory}' not allowed for CPU '{cpu}'")]
    InvalidMemoryForCpu {
        cpu: u32,
        memory: u32,
        allowed_memories: Vec<u32>,
    },
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Iterate the tier table in ascending CPU order.
pub fn tiers() -> impl Iterator<Item = &'static Tier> {
    TIERS.iter()
}

/// Look up the tier for a CPU value. No nearest-tier fallback.
pub fn find(cpu: u32) -> Option<&'static Tier> {
    TIERS.iter().find(|tier| tier.cpu == cpu)
}

/// Supported CPU values, ascending.
pub fn allowed_cpus() -> Vec<u32> {
    TIERS.iter().map(|tier| tier.cpu).collect()
}

/// Allowed memory values for `cpu`, or `None` if the CPU is not a tier.
pub fn allowed_memory(cpu: u32) -> Option<Vec<u32>> {
    find(cpu).map(|tier| tier.memory.values())
}

/// Check that `(cpu, memory)` is a legal allotment.
pub fn validate(cpu: u32, memory: u32) -> Result<(), TierError> {
    let tier = find(cpu).ok_or_else(|| TierError::InvalidCpuTier {
        cpu,
        allowed_cpus: allowed_cpus(),
    })?;

    if !tier.contains(memory) {
        return Err(TierError::InvalidMemoryForCpu {
            cpu,
            memory,
            allowed_memories: tier.memory.values(),
        });
    }

    Ok(())
}
