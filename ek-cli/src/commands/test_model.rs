use std::process::ExitCode;

use ek_harness::{load_failure_report, validate};

use crate::args::TestModelArgs;
use crate::commands::{exit_code, print_report, write_json};

pub fn test_model(args: TestModelArgs) -> anyhow::Result<ExitCode> {
    let report = match validate(&args.model_path) {
        Ok(report) => report,
        Err(e) => load_failure_report(&e),
    };

    println!("Validation of '{}'", args.model_path.display());
    print_report(&report);

    if let Some(path) = &args.output_json {
        write_json(path, &report)?;
    }

    Ok(exit_code(report.all_passed()))
}
