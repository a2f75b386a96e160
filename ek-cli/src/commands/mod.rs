use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use ek_harness::ValidationReport;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::args::Command;

mod benchmark;
mod convert;
mod inspect;
mod remote;
mod test_model;

pub fn run(command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Convert(args) => convert::convert(args),
        Command::TestModel(args) => test_model::test_model(args),
        Command::Benchmark(args) => benchmark::benchmark(args),
        Command::Inspect(args) => inspect::inspect(args),
        Command::ServeCheck(args) => remote::serve_check(args),
        Command::RemoteBench(args) => remote::remote_bench(args),
    }
}

fn print_table<const N: usize>(header: [&str; N], rows: impl IntoIterator<Item = [String; N]>) {
    let mut builder = Builder::default();
    builder.set_header(header);
    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    println!("{}", table);
}

fn print_report(report: &ValidationReport) {
    let rows = report.iter().map(|(name, check)| {
        let status = if check.passed { "PASS" } else { "FAIL" };
        [name.to_owned(), status.to_owned(), check.message.clone()]
    });
    print_table(["Check", "Status", "Message"], rows);

    let failed = report.iter().filter(|(_, c)| !c.passed).count();
    if failed == 0 {
        println!("All {} checks passed", report.len());
    } else {
        println!("{} of {} checks failed", failed, report.len());
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
    println!("Results saved to '{}'", path.display());
    Ok(())
}
