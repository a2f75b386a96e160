#![warn(missing_debug_implementations)]

//! Conversion of trained models into ONNX files.
//!
//! A [ConverterRegistry] maps each [SourceFramework] to a [Converter]:
//! * [PyTorchConverter](pytorch::PyTorchConverter) exports `.safetensors` linear stacks natively
//!   and other checkpoints through `torch.onnx.export`.
//! * [TensorFlowConverter](tensorflow::TensorFlowConverter) runs `tf2onnx` on SavedModel directories and Keras files.
//!
//! ```no_run
//! # use std::path::Path;
//! # use ek_convert::{ConvertConfig, ConvertOptions, ConverterRegistry, SourceFramework};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ConverterRegistry::new(&ConvertConfig::default());
//! let output = registry.convert(
//!     SourceFramework::PyTorch,
//!     Path::new("model.safetensors"),
//!     Path::new("model.onnx"),
//!     13,
//!     &ConvertOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```

pub use artifact::{ArtifactFormat, ModelArtifact};
pub use error::{ConvertError, ConvertResult};
pub use options::{ConvertConfig, ConvertOptions, SourceFramework, DEFAULT_OPSET};
pub use python::Python;
pub use registry::{Converter, ConverterRegistry};

mod artifact;
mod error;
pub mod linear_stack;
mod options;
mod output;
mod python;
pub mod pytorch;
mod registry;
pub mod tensorflow;
