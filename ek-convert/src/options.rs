use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

/// The framework a model was trained with, which selects the converter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFramework {
    PyTorch,
    TensorFlow,
}

impl SourceFramework {
    pub fn name(self) -> &'static str {
        match self {
            SourceFramework::PyTorch => "pytorch",
            SourceFramework::TensorFlow => "tensorflow",
        }
    }
}

impl Display for SourceFramework {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Settings of the conversion environment, passed explicitly instead of read from the process environment.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Interpreter used for the converters that call into Python frameworks.
    pub python: PathBuf,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            python: PathBuf::from("python3"),
        }
    }
}

pub const DEFAULT_OPSET: i64 = 13;
pub const DEFAULT_INPUT_NAME: &str = "input";
pub const DEFAULT_OUTPUT_NAME: &str = "output";
pub const BATCH_AXIS_NAME: &str = "batch_size";

/// Options for a single conversion. Keys a converter doesn't recognize are passed through `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// The target ONNX opset.
    pub opset: i64,
    pub input_names: Vec<String>,
    pub output_names: Vec<String>,
    /// Axes of the first input and output that are exported as dynamic, `None` means just the batch axis.
    pub dynamic_axes: Option<Vec<usize>>,
    /// Shape of the example input, authoritative when given.
    pub input_shape: Option<Vec<usize>>,
    pub signature_key: Option<String>,
    pub extra: IndexMap<String, String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            opset: DEFAULT_OPSET,
            input_names: vec![],
            output_names: vec![],
            dynamic_axes: None,
            input_shape: None,
            signature_key: None,
            extra: IndexMap::new(),
        }
    }
}

impl ConvertOptions {
    pub fn input_name(&self) -> &str {
        self.input_names.first().map_or(DEFAULT_INPUT_NAME, |s| s.as_str())
    }

    pub fn output_name(&self) -> &str {
        self.output_names.first().map_or(DEFAULT_OUTPUT_NAME, |s| s.as_str())
    }

    pub fn dynamic_axes(&self) -> Vec<usize> {
        match &self.dynamic_axes {
            Some(axes) => axes.clone(),
            None => vec![0],
        }
    }

    /// The symbolic name used for a dynamic axis.
    pub fn axis_name(axis: usize) -> String {
        match axis {
            0 => BATCH_AXIS_NAME.to_owned(),
            _ => format!("dim_{}", axis),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.opset, 13);
        assert_eq!(options.input_name(), "input");
        assert_eq!(options.output_name(), "output");
        assert_eq!(options.dynamic_axes(), vec![0]);
        assert_eq!(ConvertOptions::axis_name(0), "batch_size");
        assert_eq!(ConvertOptions::axis_name(2), "dim_2");
    }

    #[test]
    fn explicit_names() {
        let options = ConvertOptions {
            input_names: vec!["x".to_owned()],
            output_names: vec!["logits".to_owned(), "aux".to_owned()],
            dynamic_axes: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(options.input_name(), "x");
        assert_eq!(options.output_name(), "logits");
        assert!(options.dynamic_axes().is_empty());
    }
}
