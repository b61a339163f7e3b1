//! Synthetic load for exercising the scheduler's overload handling.

use crate::error::SystemError;
use crate::ticker::TickSystem;
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

/// Default priority, between gameplay and anything that runs late.
pub const WORKLOAD_PRIORITY: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Busy-spin for the duration.
    Cpu(Duration),
    /// Block the thread for the duration.
    Sleep(Duration),
    /// Allocate and fill this many bytes.
    Memory(usize),
}

impl Workload {
    pub fn kind(&self) -> &'static str {
        match self {
            Workload::Cpu(_) => "cpu",
            Workload::Sleep(_) => "sleep",
            Workload::Memory(_) => "memory",
        }
    }
}

pub struct WorkloadSystem {
    name: String,
    priority: i32,
    workload: Workload,
}

impl WorkloadSystem {
    pub fn new(workload: Workload) -> Self {
        Self {
            name: format!("Workload_{}", workload.kind()),
            priority: WORKLOAD_PRIORITY,
            workload,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl TickSystem for WorkloadSystem {
    fn update(&mut self, _delta_time: Duration) -> Result<(), SystemError> {
        match self.workload {
            Workload::Cpu(duration) => {
                let end = Instant::now() + duration;
                let mut spins = 0u64;
                while Instant::now() < end {
                    spins = black_box(spins.wrapping_add(1));
                }
            }
            Workload::Sleep(duration) => thread::sleep(duration),
            Workload::Memory(bytes) => {
                let data: Vec<u8> = (0..bytes).map(|i| (i % 256) as u8).collect();
                black_box(&data);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
