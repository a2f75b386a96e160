use std::ffi::OsString;
use std::path::Path;

use itertools::Itertools;
use tracing::{debug, info};

use crate::artifact::{ArtifactFormat, ModelArtifact};
use crate::error::ConvertResult;
use crate::options::ConvertOptions;
use crate::output::PendingOutput;
use crate::python::Python;
use crate::registry::Converter;
use crate::SourceFramework;

const INSTALL_HINT: &str = "Install them with: pip install tensorflow tf2onnx";

/// Converts TensorFlow SavedModel directories and Keras archives through `tf2onnx`.
#[derive(Debug, Clone)]
pub struct TensorFlowConverter {
    python: Python,
}

impl TensorFlowConverter {
    pub fn new(python: Python) -> Self {
        TensorFlowConverter { python }
    }
}

/// The command line arguments for `python -m tf2onnx.convert`.
pub fn tf2onnx_args(artifact: &ModelArtifact, output: &Path, options: &ConvertOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![];

    match artifact.format() {
        ArtifactFormat::KerasArchive => args.push("--keras".into()),
        _ => args.push("--saved-model".into()),
    }
    args.push(artifact.path().into());

    args.push("--output".into());
    args.push(output.into());
    args.push("--opset".into());
    args.push(options.opset.to_string().into());

    if let Some(key) = &options.signature_key {
        args.push("--signature_def".into());
        args.push(key.into());
    }

    if !options.input_names.is_empty() {
        // tf2onnx accepts an input shape override in the form name[d0,d1,...]
        let inputs = match (&options.input_shape, options.input_names.as_slice()) {
            (Some(shape), [name]) => format!("{}[{}]", name, shape.iter().join(",")),
            _ => options.input_names.join(","),
        };
        args.push("--inputs".into());
        args.push(inputs.into());
    }
    if !options.output_names.is_empty() {
        args.push("--outputs".into());
        args.push(options.output_names.join(",").into());
    }

    for (key, value) in &options.extra {
        args.push(format!("--{}", key).into());
        if !value.is_empty() {
            args.push(value.into());
        }
    }

    args
}

impl Converter for TensorFlowConverter {
    fn framework(&self) -> SourceFramework {
        SourceFramework::TensorFlow
    }

    fn check_available(&self) -> ConvertResult<()> {
        self.python
            .probe(SourceFramework::TensorFlow, &["tensorflow", "tf2onnx"], INSTALL_HINT)
    }

    fn export(&self, artifact: &ModelArtifact, output_path: &Path, options: &ConvertOptions) -> ConvertResult<ModelArtifact> {
        if artifact.format() != ArtifactFormat::KerasArchive {
            artifact.expect_format(ArtifactFormat::SavedGraphDirectory)?;
        }
        self.check_available()?;

        if options.dynamic_axes.is_some() {
            debug!("tf2onnx keeps unknown dimensions dynamic, ignoring the dynamic axes option");
        }

        let output = PendingOutput::new(output_path)?;
        info!("Converting '{}' with tf2onnx", artifact.path().display());
        self.python
            .run_module("tf2onnx.convert", &tf2onnx_args(artifact, output.path(), options))?;

        let path = output.persist()?;
        Ok(ModelArtifact::new(path, ArtifactFormat::Interchange))
    }
}
