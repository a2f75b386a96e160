use std::process::ExitCode;

use anyhow::Context;
use ek_graph::onnx::load_graph_from_onnx_path;

use crate::args::InspectArgs;

pub fn inspect(args: InspectArgs) -> anyhow::Result<ExitCode> {
    let graph = load_graph_from_onnx_path(&args.model_path, true)
        .with_context(|| format!("Failed to load '{}'", args.model_path.display()))?;

    print!("{}", graph);
    Ok(ExitCode::SUCCESS)
}
