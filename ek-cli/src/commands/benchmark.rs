use std::process::ExitCode;

use anyhow::{bail, Context};
use ek_harness::{benchmark as run_benchmark, compare, display_names, BenchmarkConfig, BenchmarkResult};
use indexmap::IndexMap;
use tracing::warn;

use crate::args::BenchmarkArgs;
use crate::commands::{print_table, write_json};

pub fn benchmark(args: BenchmarkArgs) -> anyhow::Result<ExitCode> {
    if args.gpu && !ek_runtime::compiled_with_accelerator_support() {
        warn!("edgekit was built without accelerator support, the benchmark runs on the CPU");
    }

    let config = BenchmarkConfig {
        input_shapes: if args.input_shapes.is_empty() {
            None
        } else {
            Some(args.input_shapes.into_iter().map(|dims| dims.0).collect())
        },
        warmup: args.warmup,
        runs: args.runs as usize,
        use_accelerator: args.gpu,
        keep_samples: args.samples,
    };

    let results = if args.compare {
        let results = compare(&args.model_paths, &config);
        if results.is_empty() {
            bail!("None of the {} models could be benchmarked", args.model_paths.len());
        }
        results
    } else {
        let paths = &args.model_paths[..1];
        if args.model_paths.len() > 1 {
            warn!(
                "Ignoring {} extra model paths, pass --compare to benchmark all of them",
                args.model_paths.len() - 1
            );
        }

        let result = run_benchmark(&paths[0], &config)
            .with_context(|| format!("Failed to benchmark '{}'", paths[0].display()))?;
        display_names(paths).into_iter().zip([result]).collect::<IndexMap<_, _>>()
    };

    print_results(&results, args.samples);

    if let Some(path) = &args.json {
        match results.values().next() {
            Some(result) if !args.compare => write_json(path, result)?,
            _ => write_json(path, &results)?,
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_results(results: &IndexMap<String, BenchmarkResult>, samples: bool) {
    if samples {
        let rows = results.iter().map(|(name, r)| {
            let latency = |f: fn(&ek_harness::LatencySummary) -> f64| {
                r.latency.as_ref().map_or("-".to_owned(), |l| format!("{:.3}", f(l)))
            };
            [
                name.clone(),
                format!("{:.3}", r.average_latency_ms),
                latency(|l| l.min_ms),
                latency(|l| l.median_ms),
                latency(|l| l.p95_ms),
                latency(|l| l.max_ms),
                format!("{:.1}", r.throughput_per_sec),
                format!("{:.2}", r.memory_delta_mb),
                r.sample_count.to_string(),
            ]
        });
        print_table(
            [
                "Model",
                "Avg (ms)",
                "Min (ms)",
                "Median (ms)",
                "P95 (ms)",
                "Max (ms)",
                "Throughput (/s)",
                "Memory (MB)",
                "Runs",
            ],
            rows,
        );
    } else {
        let rows = results.iter().map(|(name, r)| {
            [
                name.clone(),
                format!("{:.3}", r.average_latency_ms),
                format!("{:.1}", r.throughput_per_sec),
                format!("{:.2}", r.memory_delta_mb),
                format!("{:.3}", r.total_wall_time),
                r.sample_count.to_string(),
            ]
        });
        print_table(
            [
                "Model",
                "Avg (ms)",
                "Throughput (/s)",
                "Memory (MB)",
                "Total (s)",
                "Runs",
            ],
            rows,
        );
    }
}
