use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ek_runtime::{Device, LoadError, RunError, Session};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::inputs::{check_shape, format_dims, random_inputs, random_normal};
use crate::memory::{memory_delta_mb, MemorySampler};
use crate::stats::LatencySummary;

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Explicit shapes for each input, derived from the declared inputs if `None`.
    pub input_shapes: Option<Vec<Vec<usize>>>,
    pub warmup: usize,
    pub runs: usize,
    pub use_accelerator: bool,
    /// Keep the per-call latencies and summarize them in [BenchmarkResult::latency].
    pub keep_samples: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            input_shapes: None,
            warmup: 10,
            runs: 100,
            use_accelerator: false,
            keep_samples: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub average_latency_ms: f64,
    pub throughput_per_sec: f64,
    pub memory_delta_mb: f64,
    /// Wall time of the timed calls in seconds.
    pub total_wall_time: f64,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencySummary>,
}

#[derive(Debug, thiserror::Error)]
pub enum BenchmarkError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("got {actual} input shapes but the model has {expected} inputs")]
    InputCountMismatch { expected: usize, actual: usize },
    #[error("the number of timed runs must be at least 1")]
    InvalidRunCount,
    #[error("invalid input shape: {0}")]
    InvalidShape(String),
    #[error(transparent)]
    Run(#[from] RunError),
}

pub fn benchmark(path: impl AsRef<Path>, config: &BenchmarkConfig) -> Result<BenchmarkResult, BenchmarkError> {
    benchmark_with_rng(path, config, &mut StdRng::from_entropy())
}

pub fn benchmark_with_rng(
    path: impl AsRef<Path>,
    config: &BenchmarkConfig,
    rng: &mut impl Rng,
) -> Result<BenchmarkResult, BenchmarkError> {
    if config.runs == 0 {
        return Err(BenchmarkError::InvalidRunCount);
    }

    let path = path.as_ref();
    let session = Session::load(path, Device::select(config.use_accelerator))?;
    info!("Benchmarking '{}' on {}", path.display(), session.device());

    benchmark_session(&session, config, rng)
}

pub fn benchmark_session(
    session: &Session,
    config: &BenchmarkConfig,
    rng: &mut impl Rng,
) -> Result<BenchmarkResult, BenchmarkError> {
    if config.runs == 0 {
        return Err(BenchmarkError::InvalidRunCount);
    }

    let inputs = match &config.input_shapes {
        None => random_inputs(rng, session.inputs()).map_err(BenchmarkError::InvalidShape)?,
        Some(shapes) => {
            let specs = session.inputs();
            if shapes.len() != specs.len() {
                return Err(BenchmarkError::InputCountMismatch {
                    expected: specs.len(),
                    actual: shapes.len(),
                });
            }
            specs
                .iter()
                .zip(shapes)
                .map(|(spec, dims)| {
                    check_shape(spec, dims).map_err(BenchmarkError::InvalidShape)?;
                    Ok(random_normal(rng, dims))
                })
                .collect::<Result<Vec<_>, BenchmarkError>>()?
        }
    };
    debug!(
        "Using input shapes {:?}",
        inputs.iter().map(|i| format_dims(i.shape())).collect::<Vec<_>>()
    );

    for _ in 0..config.warmup {
        session.run(&inputs)?;
    }

    let mut sampler = MemorySampler::new();
    let memory_before = sampler.rss_bytes();

    let mut samples = Vec::with_capacity(if config.keep_samples { config.runs } else { 0 });
    let start = Instant::now();
    for _ in 0..config.runs {
        let call_start = Instant::now();
        session.run(&inputs)?;
        if config.keep_samples {
            samples.push(call_start.elapsed().as_secs_f64() * 1000.0);
        }
    }
    let total = start.elapsed().as_secs_f64();

    let memory_after = sampler.rss_bytes();

    let runs = config.runs as f64;
    Ok(BenchmarkResult {
        average_latency_ms: total / runs * 1000.0,
        throughput_per_sec: if total > 0.0 { runs / total } else { f64::INFINITY },
        memory_delta_mb: memory_delta_mb(memory_before, memory_after),
        total_wall_time: total,
        sample_count: config.runs,
        latency: LatencySummary::from_samples(&samples),
    })
}

/// Benchmark each model in turn, keyed by display name. Models that fail are skipped with a warning.
pub fn compare(paths: &[PathBuf], config: &BenchmarkConfig) -> IndexMap<String, BenchmarkResult> {
    let mut results = IndexMap::new();

    for (name, path) in display_names(paths).into_iter().zip(paths) {
        match benchmark(path, config) {
            Ok(result) => {
                results.insert(name, result);
            }
            Err(e) => warn!("Skipping '{}': {}", path.display(), e),
        }
    }

    results
}

/// The file stem of each path, with the first free ` (n)` suffix added to repeated names.
pub fn display_names(paths: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();

    paths
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let mut name = stem.clone();
            let mut index = 2;
            while taken.contains(&name) {
                name = format!("{} ({})", stem, index);
                index += 1;
            }

            taken.insert(name.clone());
            name
        })
        .collect()
}
