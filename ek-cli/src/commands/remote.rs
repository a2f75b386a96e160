use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use ek_harness::remote::{default_instance, remote_benchmark, smoke_test, RemoteClient, RemoteConfig};

use crate::args::{RemoteArgs, RemoteBenchArgs};
use crate::commands::{exit_code, print_report, print_table};

fn client(args: &RemoteArgs, predict_timeout: Option<Duration>) -> anyhow::Result<RemoteClient> {
    let defaults = RemoteConfig::default();
    let config = RemoteConfig {
        base_url: args.url.clone(),
        predict_timeout: predict_timeout.unwrap_or(defaults.predict_timeout),
        ..defaults
    };
    Ok(RemoteClient::new(config)?)
}

pub fn serve_check(args: RemoteArgs) -> anyhow::Result<ExitCode> {
    let client = client(&args, None)?;
    let report = smoke_test(&client, &args.model, args.model_version.as_deref());

    println!("Serving check of model '{}' at {}", args.model, client.base_url());
    print_report(&report);
    Ok(exit_code(report.all_passed()))
}

pub fn remote_bench(args: RemoteBenchArgs) -> anyhow::Result<ExitCode> {
    let timeout = Duration::try_from_secs_f64(args.timeout)
        .ok()
        .filter(|t| !t.is_zero())
        .with_context(|| format!("Invalid timeout {}", args.timeout))?;

    let remote = &args.remote;
    let client = client(remote, Some(timeout))?;
    let instance = args.instance.unwrap_or_else(default_instance);

    let result = remote_benchmark(
        &client,
        &remote.model,
        remote.model_version.as_deref(),
        &instance,
        args.requests,
    )?;

    println!(
        "Benchmark of model '{}' at {} with {} requests",
        remote.model,
        client.base_url(),
        result.requests
    );
    let latency = result.latency;
    let rows = [
        ("Successful requests", result.successes.to_string()),
        ("Failed requests", result.failures.to_string()),
        ("Success rate", format!("{:.1}%", result.success_rate() * 100.0)),
        ("Average (ms)", format!("{:.2}", result.average_ms)),
        ("Min (ms)", format!("{:.2}", latency.min_ms)),
        ("Max (ms)", format!("{:.2}", latency.max_ms)),
        ("P50 (ms)", format!("{:.2}", latency.median_ms)),
        ("P95 (ms)", format!("{:.2}", latency.p95_ms)),
    ];
    print_table(["Metric", "Value"], rows.map(|(k, v)| [k.to_owned(), v]));

    Ok(ExitCode::SUCCESS)
}
