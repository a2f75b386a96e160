use std::path::{Path, PathBuf};

use ek_graph::dtype::{DType, Tensor};
use ek_graph::graph::{Graph, TensorSpec};
use ek_graph::onnx::load_graph_from_onnx_path;
use ek_graph::onnx::result::OnnxError;
use ek_graph::shape::Shape;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{debug, info};

use crate::cpu::{cpu_eval_graph, OperationError};
use crate::Device;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("model file '{}' not found", .0.display())]
    NotFound(PathBuf),
    #[error("model file '{}' is not a valid model: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: OnnxError,
    },
    #[error("model '{model}' cannot be executed: {reason}")]
    Unsupported { model: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("expected {expected} inputs, got {actual}")]
    InputCount { expected: usize, actual: usize },
    #[error("input '{name}' has shape {actual:?}, which does not match the declared shape {expected}")]
    InputShape {
        name: String,
        expected: Shape,
        actual: Vec<usize>,
    },
    #[error("no input named '{0}'")]
    UnknownInput(String),
    #[error("missing value for input '{0}'")]
    MissingInput(String),
    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// A loaded model, ready to be evaluated any number of times.
#[derive(Debug)]
pub struct Session {
    graph: Graph,
    device: Device,
}

impl Session {
    /// Load an ONNX model from disk. External tensor data next to the model file is allowed.
    pub fn load(path: impl AsRef<Path>, device: Device) -> Result<Session, LoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_owned()));
        }

        let graph = load_graph_from_onnx_path(path, true).map_err(|e| {
            if e.is_malformed() || matches!(e, OnnxError::IO(_, _)) {
                LoadError::Corrupt {
                    path: path.to_owned(),
                    source: e,
                }
            } else {
                LoadError::Unsupported {
                    model: path.display().to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        info!(
            "Loaded model '{}' with {} inputs, {} outputs and {} nodes",
            path.display(),
            graph.inputs().len(),
            graph.outputs().len(),
            graph.nodes().len()
        );

        Session::from_graph(graph, device)
    }

    pub fn from_graph(graph: Graph, device: Device) -> Result<Session, LoadError> {
        let unsupported = graph
            .inputs()
            .iter()
            .chain(graph.outputs())
            .find(|spec| spec.dtype != DType::F32);
        if let Some(spec) = unsupported {
            return Err(LoadError::Unsupported {
                model: graph.name.clone(),
                reason: format!("tensor '{}' has element type {}, only float32 is supported", spec.name, spec.dtype),
            });
        }

        debug!("Preparing graph '{}' on {}", graph.name, device);
        Ok(Session { graph, device })
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        self.graph.inputs()
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        self.graph.outputs()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Run the model on positional inputs, returning the outputs in declaration order.
    pub fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>, RunError> {
        let specs = self.graph.inputs();
        if specs.len() != inputs.len() {
            return Err(RunError::InputCount {
                expected: specs.len(),
                actual: inputs.len(),
            });
        }

        for (spec, tensor) in specs.iter().zip(inputs) {
            if let Some(shape) = &spec.shape {
                if !shape.accepts(tensor.shape()) {
                    return Err(RunError::InputShape {
                        name: spec.name.clone(),
                        expected: shape.clone(),
                        actual: tensor.shape().to_vec(),
                    });
                }
            }
        }

        let outputs = match self.device {
            Device::Cpu => cpu_eval_graph(&self.graph, inputs)?,
        };
        Ok(outputs)
    }

    /// Run the model on inputs given by name, returning the outputs by name.
    pub fn run_named(&self, mut inputs: IndexMap<String, Tensor>) -> Result<IndexMap<String, Tensor>, RunError> {
        let ordered = self
            .graph
            .inputs()
            .iter()
            .map(|spec| {
                inputs
                    .swap_remove(&spec.name)
                    .ok_or_else(|| RunError::MissingInput(spec.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(name) = inputs.keys().next() {
            return Err(RunError::UnknownInput(name.clone()));
        }

        let outputs = self.run(&ordered)?;
        Ok(self.graph.outputs().iter().map(|spec| spec.name.clone()).zip_eq(outputs).collect())
    }
}
