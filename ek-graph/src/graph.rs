use std::fmt::{Debug, Display, Formatter};

use indexmap::IndexMap;
use itertools::Itertools;
use serde::Serialize;

use crate::dtype::{DType, Tensor};
use crate::shape::Shape;

/// An inference graph as loaded from an ONNX file.
///
/// Values are identified by their name, exactly like in the file format.
/// Nodes are stored in topological order, every node input is either a graph input,
/// a constant or the output of an earlier node.
///
/// ```
/// # use ek_graph::onnx::GraphBuilder;
/// # use ek_graph::onnx::load_graph_from_onnx_bytes;
/// # use ek_graph::shape;
/// # use ek_graph::shape::Size;
/// let mut builder = GraphBuilder::new("tiny", 13);
/// builder.input("x", shape![Size::dynamic("batch_size"), 4]);
/// builder.node("Relu", &["x"], &["y"]);
/// builder.output("y", shape![Size::dynamic("batch_size"), 4]);
///
/// let graph = load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap();
/// assert_eq!(graph.inputs()[0].shape.as_ref().unwrap().to_string(), "[batch_size, 4]");
/// println!("{}", graph);
/// ```
#[derive(Clone)]
pub struct Graph {
    pub name: String,
    pub producer: String,
    pub opset: Option<i64>,
    /// Free-form key/value pairs stored in the model file.
    pub metadata: IndexMap<String, String>,

    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    constants: IndexMap<String, Tensor>,
    nodes: Vec<Node>,
}

/// Declared name, shape and element type of a graph input or output.
///
/// `shape` is `None` if the file did not declare one at all.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Option<Shape>,
    pub dtype: DType,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub operation: Operation,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// The operations the CPU executor understands.
/// Operations with compile-time arguments (eg. the target shape of a reshape) have them folded in at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Copy the input, also used for `Dropout` in inference mode.
    Identity,
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Plain rank-2 matrix multiplication.
    MatMul,
    /// `alpha * A' * B' + beta * C`, with `C` optional and broadcast.
    Gemm {
        alpha: f32,
        beta: f32,
        trans_a: bool,
        trans_b: bool,
    },
    Softmax { axis: i64 },
    Flatten { axis: i64 },
    /// Reshape to the given shape, `0` copies the input dim (unless `allow_zero`) and `-1` is inferred.
    Reshape { shape: Vec<i64>, allow_zero: bool },
    Transpose { perm: Option<Vec<usize>> },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Relu,
    Sigmoid,
    Tanh,
    Exp,
    Neg,
    Sqrt,
    Abs,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph {
            name: name.into(),
            producer: String::new(),
            opset: None,
            metadata: IndexMap::new(),
            inputs: vec![],
            outputs: vec![],
            constants: IndexMap::new(),
            nodes: vec![],
        }
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn constants(&self) -> &IndexMap<String, Tensor> {
        &self.constants
    }

    pub fn constant(&self, name: &str) -> Option<&Tensor> {
        self.constants.get(name)
    }

    pub(crate) fn push_input(&mut self, spec: TensorSpec) {
        self.inputs.push(spec);
    }

    pub(crate) fn push_output(&mut self, spec: TensorSpec) {
        self.outputs.push(spec);
    }

    pub(crate) fn push_constant(&mut self, name: String, tensor: Tensor) {
        self.constants.insert(name, tensor);
    }

    pub(crate) fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// The number of learned parameters, ie. the total element count of all constants.
    pub fn parameter_count(&self) -> usize {
        self.constants.values().map(|t| t.len()).sum()
    }
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Option<Shape>, dtype: DType) -> Self {
        TensorSpec {
            name: name.into(),
            shape,
            dtype,
        }
    }
}

impl Display for TensorSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.shape {
            Some(shape) => write!(f, "{}: {} {}", self.name, self.dtype, shape),
            None => write!(f, "{}: {} [unknown]", self.name, self.dtype),
        }
    }
}

impl Debug for Graph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("inputs", &self.inputs.iter().map(|s| s.to_string()).collect_vec())
            .field("outputs", &self.outputs.iter().map(|s| s.to_string()).collect_vec())
            .finish_non_exhaustive()
    }
}

impl Display for Graph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph {{")?;
        writeln!(f, "  name: {:?},", self.name)?;
        writeln!(f, "  producer: {:?},", self.producer)?;
        match self.opset {
            Some(opset) => writeln!(f, "  opset: {},", opset)?,
            None => writeln!(f, "  opset: unknown,")?,
        }

        for (key, value) in &self.metadata {
            writeln!(f, "  {}: {:?},", key, value)?;
        }

        writeln!(f, "  inputs: [")?;
        for input in &self.inputs {
            writeln!(f, "    {},", input)?;
        }
        writeln!(f, "  ],")?;
        writeln!(f, "  outputs: [")?;
        for output in &self.outputs {
            writeln!(f, "    {},", output)?;
        }
        writeln!(f, "  ],")?;

        writeln!(
            f,
            "  constants: {} tensors, {} parameters,",
            self.constants.len(),
            self.parameter_count()
        )?;

        writeln!(f, "  nodes: [")?;
        for node in &self.nodes {
            writeln!(
                f,
                "    {:?} = {:?}({}),",
                node.outputs,
                node.operation,
                node.inputs.join(", ")
            )?;
        }
        writeln!(f, "  ],")?;

        writeln!(f, "}}")?;
        Ok(())
    }
}
