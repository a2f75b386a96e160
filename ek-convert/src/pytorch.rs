use std::ffi::OsString;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::{ArtifactFormat, ModelArtifact};
use crate::error::{ConvertError, ConvertResult};
use crate::linear_stack::LinearStack;
use crate::options::ConvertOptions;
use crate::output::PendingOutput;
use crate::python::Python;
use crate::registry::Converter;
use crate::SourceFramework;

/// Example input used for opaque checkpoints when the caller gives no shape, an image batch of one.
pub const DEFAULT_CHECKPOINT_INPUT_SHAPE: [usize; 4] = [1, 3, 224, 224];

const INSTALL_HINT: &str = "Install it with: pip install torch";

const EXPORT_SCRIPT: &str = r#"
import json, sys
import torch

args = json.loads(sys.argv[1])
try:
    model = torch.load(args["model"], map_location="cpu", weights_only=False)
except TypeError:
    model = torch.load(args["model"], map_location="cpu")
if not isinstance(model, torch.nn.Module):
    raise SystemExit("checkpoint contains a %s, not a torch.nn.Module" % type(model).__name__)
model.eval()

extra = {}
for key, value in args["extra"].items():
    try:
        extra[key] = json.loads(value)
    except ValueError:
        extra[key] = value

dynamic_axes = {name: {int(axis): axis_name for axis, axis_name in axes.items()} for name, axes in args["dynamic_axes"].items()}
torch.onnx.export(
    model,
    torch.randn(*args["input_shape"]),
    args["output"],
    input_names=args["input_names"],
    output_names=args["output_names"],
    dynamic_axes=dynamic_axes,
    opset_version=args["opset"],
    **extra
)
"#;

/// Converts PyTorch models.
///
/// `.safetensors` state dicts of a sequential stack of linear layers are exported directly,
/// other checkpoints go through `torch.onnx.export` in a Python subprocess.
#[derive(Debug, Clone)]
pub struct PyTorchConverter {
    python: Python,
}

#[derive(Debug, Serialize)]
struct ExportArgs<'a> {
    model: &'a Path,
    output: &'a Path,
    opset: i64,
    input_shape: Vec<usize>,
    input_names: Vec<&'a str>,
    output_names: Vec<&'a str>,
    dynamic_axes: IndexMap<&'a str, IndexMap<usize, String>>,
    extra: &'a IndexMap<String, String>,
}

impl PyTorchConverter {
    pub fn new(python: Python) -> Self {
        PyTorchConverter { python }
    }

    fn export_safetensors(&self, artifact: &ModelArtifact, output: &mut PendingOutput, options: &ConvertOptions) -> ConvertResult<()> {
        let path = artifact.path();
        let bytes = std::fs::read(path)
            .map_err(|e| ConvertError::failure(format!("cannot read '{}': {}", path.display(), e)))?;

        let stack = LinearStack::from_safetensors(&bytes)?;
        let name = path.file_stem().map_or("model".into(), |s| s.to_string_lossy());
        let mut builder = stack.to_onnx(&name, options)?;
        if let Some(file_name) = path.file_name() {
            builder.metadata("source", file_name.to_string_lossy());
        }

        output.write_all(&builder.to_bytes())
    }

    fn export_checkpoint(&self, artifact: &ModelArtifact, output: &PendingOutput, options: &ConvertOptions) -> ConvertResult<()> {
        self.check_available()?;

        let input_shape = match &options.input_shape {
            Some(shape) => shape.clone(),
            None => {
                warn!(
                    "No input shape given, exporting with the default example input {:?}",
                    DEFAULT_CHECKPOINT_INPUT_SHAPE
                );
                DEFAULT_CHECKPOINT_INPUT_SHAPE.to_vec()
            }
        };

        let input_names = if options.input_names.is_empty() {
            vec![options.input_name()]
        } else {
            options.input_names.iter().map(|s| s.as_str()).collect()
        };
        let output_names = if options.output_names.is_empty() {
            vec![options.output_name()]
        } else {
            options.output_names.iter().map(|s| s.as_str()).collect()
        };

        let axes: IndexMap<usize, String> = options
            .dynamic_axes()
            .into_iter()
            .map(|axis| (axis, ConvertOptions::axis_name(axis)))
            .collect();
        let mut dynamic_axes = IndexMap::new();
        if !axes.is_empty() {
            dynamic_axes.insert(input_names[0], axes.clone());
            dynamic_axes.insert(output_names[0], axes);
        }

        let args = ExportArgs {
            model: artifact.path(),
            output: output.path(),
            opset: options.opset,
            input_shape,
            input_names,
            output_names,
            dynamic_axes,
            extra: &options.extra,
        };
        let args = serde_json::to_string(&args).map_err(|e| ConvertError::failure(e.to_string()))?;

        self.python.run_script(EXPORT_SCRIPT, &[OsString::from(args)])
    }
}

impl Converter for PyTorchConverter {
    fn framework(&self) -> SourceFramework {
        SourceFramework::PyTorch
    }

    fn check_available(&self) -> ConvertResult<()> {
        self.python.probe(SourceFramework::PyTorch, &["torch"], INSTALL_HINT)
    }

    fn export(&self, artifact: &ModelArtifact, output_path: &Path, options: &ConvertOptions) -> ConvertResult<ModelArtifact> {
        artifact.expect_format(ArtifactFormat::NativeCheckpoint)?;

        let mut output = PendingOutput::new(output_path)?;
        if artifact.extension().as_deref() == Some("safetensors") {
            info!("Exporting safetensors state dict '{}'", artifact.path().display());
            self.export_safetensors(artifact, &mut output, options)?;
        } else {
            info!("Exporting checkpoint '{}' with torch.onnx", artifact.path().display());
            self.export_checkpoint(artifact, &output, options)?;
        }

        let path = output.persist()?;
        Ok(ModelArtifact::new(path, ArtifactFormat::Interchange))
    }
}
