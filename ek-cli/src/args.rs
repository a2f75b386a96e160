use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use ek_convert::{ArtifactFormat, SourceFramework, DEFAULT_OPSET};
use ek_harness::remote::{DEFAULT_BASE_URL, DEFAULT_MODEL_NAME};
use serde_json::Value;

/// Convert, validate and benchmark ONNX models for edge deployment.
#[derive(Debug, Parser)]
#[command(name = "edgekit", version)]
pub struct Cli {
    /// Increase the log level, can be repeated.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert a trained model to ONNX.
    Convert(ConvertArgs),
    /// Load a model and run the validation checks on it.
    TestModel(TestModelArgs),
    /// Measure inference latency and throughput.
    Benchmark(BenchmarkArgs),
    /// Print the inputs, outputs and nodes of a model.
    Inspect(InspectArgs),
    /// Check that a serving endpoint answers for a model.
    ServeCheck(RemoteArgs),
    /// Send a series of prediction requests to a serving endpoint.
    RemoteBench(RemoteBenchArgs),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum InputFormat {
    Pytorch,
    Tensorflow,
    /// A Keras `.h5` or `.keras` file, converted with tf2onnx.
    Keras,
    /// A TensorFlow SavedModel directory, converted with tf2onnx.
    SavedModel,
}

impl InputFormat {
    pub fn framework(self) -> SourceFramework {
        match self {
            InputFormat::Pytorch => SourceFramework::PyTorch,
            InputFormat::Tensorflow | InputFormat::Keras | InputFormat::SavedModel => SourceFramework::TensorFlow,
        }
    }

    /// The artifact format this variant insists on, if any.
    pub fn required_format(self) -> Option<ArtifactFormat> {
        match self {
            InputFormat::Pytorch | InputFormat::Tensorflow => None,
            InputFormat::Keras => Some(ArtifactFormat::KerasArchive),
            InputFormat::SavedModel => Some(ArtifactFormat::SavedGraphDirectory),
        }
    }
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[arg(value_enum)]
    pub format: InputFormat,
    #[arg(value_parser = existing_path)]
    pub model_path: PathBuf,
    #[arg(conflicts_with = "output")]
    pub output_path: Option<PathBuf>,

    /// Where to write the ONNX file [default: model.onnx]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_OPSET, value_parser = clap::value_parser!(i64).range(1..))]
    pub opset: i64,

    /// Shape of the example input, eg. `1,3,224,224`.
    #[arg(long, value_parser = parse_dims)]
    pub input_shape: Option<Dims>,
    #[arg(long = "input-name")]
    pub input_names: Vec<String>,
    #[arg(long = "output-name")]
    pub output_names: Vec<String>,
    /// Axes of the input and output to export as dynamic [default: 0]
    #[arg(long = "dynamic-axis", conflicts_with = "static_shape")]
    pub dynamic_axes: Vec<usize>,
    /// Export all axes with fixed sizes.
    #[arg(long)]
    pub static_shape: bool,
    #[arg(long)]
    pub signature_key: Option<String>,
    /// Extra converter options as `KEY=VALUE`, eg. `activation=tanh`.
    #[arg(long = "option", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
    /// The python interpreter used for framework exports.
    #[arg(long, default_value = "python3")]
    pub python: PathBuf,
}

impl ConvertArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .or_else(|| self.output_path.clone())
            .unwrap_or_else(|| PathBuf::from("model.onnx"))
    }
}

#[derive(Debug, Args)]
pub struct TestModelArgs {
    #[arg(value_parser = existing_path)]
    pub model_path: PathBuf,
    /// Also write the report as JSON.
    #[arg(long)]
    pub output_json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BenchmarkArgs {
    #[arg(required = true, value_parser = existing_path)]
    pub model_paths: Vec<PathBuf>,

    /// Shape of each input in order, eg. `-i 1,3,224,224`. Derived from the model if not given.
    #[arg(short = 'i', long = "input-shape", value_parser = parse_dims)]
    pub input_shapes: Vec<Dims>,
    #[arg(long, default_value_t = 10)]
    pub warmup: usize,
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub runs: u64,

    #[arg(long, conflicts_with = "gpu")]
    pub cpu: bool,
    /// Prefer an accelerator, falls back to the CPU if none is available.
    #[arg(long)]
    pub gpu: bool,

    /// Benchmark every given model and compare them.
    #[arg(long)]
    pub compare: bool,
    /// Keep per-run latencies and report min, median, P95 and max.
    #[arg(long)]
    pub samples: bool,
    /// Also write the results as JSON.
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[arg(value_parser = existing_path)]
    pub model_path: PathBuf,
}

#[derive(Debug, Args)]
pub struct RemoteArgs {
    #[arg(long, env = "EDGEKIT_SERVER_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,
    #[arg(long, env = "EDGEKIT_MODEL_NAME", default_value = DEFAULT_MODEL_NAME)]
    pub model: String,
    /// Model version, the unversioned endpoint is used if not given.
    #[arg(long, env = "EDGEKIT_MODEL_VERSION")]
    pub model_version: Option<String>,
}

#[derive(Debug, Args)]
pub struct RemoteBenchArgs {
    #[command(flatten)]
    pub remote: RemoteArgs,
    #[arg(long, default_value_t = 100)]
    pub requests: usize,
    /// Timeout per request in seconds.
    #[arg(long, default_value_t = 5.0)]
    pub timeout: f64,
    /// The instance to send as JSON [default: {"data": [1.0, 2.0, 3.0, 4.0]}]
    #[arg(long, value_parser = parse_json)]
    pub instance: Option<Value>,
}

/// A concrete tensor shape given on the command line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dims(pub Vec<usize>);

fn existing_path(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("path '{}' does not exist", s))
    }
}

fn parse_dims(s: &str) -> Result<Dims, String> {
    let dims = s
        .split(|c| c == ',' || c == 'x')
        .map(|d| {
            let d = d.trim();
            match d.parse::<usize>() {
                Ok(0) | Err(_) => Err(format!("invalid dimension '{}' in '{}'", d, s)),
                Ok(d) => Ok(d),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dims(dims))
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| e.to_string())
}
