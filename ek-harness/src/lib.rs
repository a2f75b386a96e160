#![warn(missing_debug_implementations)]

//! Harnesses that exercise ONNX models: structural validation with a synthetic inference,
//! latency/throughput benchmarks, and checks against a model served over HTTP.
//!
//! ```no_run
//! # use ek_harness::{benchmark, validate, BenchmarkConfig};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = validate("model.onnx")?;
//! assert!(report.all_passed());
//!
//! let result = benchmark("model.onnx", &BenchmarkConfig::default())?;
//! println!("{:.3} ms", result.average_latency_ms);
//! # Ok(())
//! # }
//! ```

pub use benchmark::{benchmark, benchmark_with_rng, compare, display_names, BenchmarkConfig, BenchmarkError, BenchmarkResult};
pub use report::{CheckResult, TensorDetails, ValidationReport};
pub use stats::LatencySummary;
pub use validate::{load_failure_report, validate, validate_with_rng};

pub mod benchmark;
pub mod inputs;
pub mod memory;
pub mod remote;
mod report;
pub mod stats;
pub mod validate;
