#![warn(missing_debug_implementations)]

//! Inference sessions on top of `ek-graph`, selecting the executor at runtime through the [Device] type.
//!
//! Only the [Device::Cpu] executor exists. Asking for an accelerator through [Device::select]
//! falls back to the CPU with a warning, so callers can request one unconditionally.
//!
//! ```no_run
//! # use ek_graph::dtype::Tensor;
//! # use ek_runtime::{Device, Session};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::load("model.onnx", Device::select(true))?;
//!
//! let inputs = [Tensor::zeros(vec![1, 10])];
//! let outputs = session.run(&inputs)?;
//! println!("{:?}", outputs[0].shape());
//! # Ok(())
//! # }
//! ```

use std::fmt::{Display, Formatter};

use tracing::warn;

pub use session::{LoadError, RunError, Session};

pub mod cpu;
mod session;

/// Whether the crate was compiled with an accelerator executor.
///
/// This is independent of whether the current system actually has an accelerator available.
pub fn compiled_with_accelerator_support() -> bool {
    false
}

/// A device that can be used to evaluate a graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Device {
    Cpu,
}

impl Device {
    /// Returns the first available accelerator if any.
    pub fn first_accelerator() -> Option<Device> {
        // no accelerator executor is compiled in yet
        None
    }

    /// The device to use for the given preference, an accelerator preference falls back to the CPU.
    pub fn select(use_accelerator: bool) -> Device {
        if !use_accelerator {
            return Device::Cpu;
        }

        match Device::first_accelerator() {
            Some(device) => device,
            None => {
                warn!("No accelerator available, falling back to the CPU");
                Device::Cpu
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
        }
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
