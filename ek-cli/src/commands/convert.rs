use std::process::ExitCode;

use anyhow::Context;
use ek_convert::{ConvertConfig, ConvertOptions, ConverterRegistry, ModelArtifact};

use crate::args::ConvertArgs;

pub fn convert(args: ConvertArgs) -> anyhow::Result<ExitCode> {
    if let Some(expected) = args.format.required_format() {
        ModelArtifact::identify(&args.model_path)?.expect_format(expected)?;
    }

    let output_path = args.output_path();
    let dynamic_axes = if args.static_shape {
        Some(vec![])
    } else if args.dynamic_axes.is_empty() {
        None
    } else {
        Some(args.dynamic_axes)
    };

    let options = ConvertOptions {
        opset: args.opset,
        input_names: args.input_names,
        output_names: args.output_names,
        dynamic_axes,
        input_shape: args.input_shape.map(|dims| dims.0),
        signature_key: args.signature_key,
        extra: args.options.into_iter().collect(),
    };

    let registry = ConverterRegistry::new(&ConvertConfig { python: args.python });
    let output = registry
        .convert(
            args.format.framework(),
            &args.model_path,
            &output_path,
            args.opset,
            &options,
        )
        .with_context(|| format!("Failed to convert '{}'", args.model_path.display()))?;

    println!("Model converted successfully: {}", output.display());
    Ok(ExitCode::SUCCESS)
}
