use ek_graph::dtype::Tensor;
use ek_graph::graph::{BinaryOp, Graph, Node, Operation, UnaryOp};
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array2, ArrayView2, Axis, Dimension, Ix2, IxDyn};

/// A node could not be evaluated on the values it was given.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("expected {expected} inputs, got {actual}")]
    InputCount { expected: usize, actual: usize },
    #[error("value '{0}' is not defined")]
    UndefinedValue(String),
    #[error("node '{node}' ({operation}): {message}")]
    Invalid {
        node: String,
        operation: String,
        message: String,
    },
}

/// Evaluate the graph on the given inputs and return its outputs in declaration order.
pub fn cpu_eval_graph(graph: &Graph, inputs: &[Tensor]) -> Result<Vec<Tensor>, OperationError> {
    if graph.inputs().len() != inputs.len() {
        return Err(OperationError::InputCount {
            expected: graph.inputs().len(),
            actual: inputs.len(),
        });
    }

    let mut values: IndexMap<&str, Tensor> = IndexMap::default();

    for (spec, tensor) in graph.inputs().iter().zip(inputs) {
        values.insert(&spec.name, tensor.clone());
    }

    for node in graph.nodes() {
        let operands = node
            .inputs
            .iter()
            .map(|name| lookup(graph, &values, name).cloned())
            .collect::<Result<Vec<Tensor>, _>>()?;

        let result = eval_node(node, &operands)?;

        // the loader guarantees each node has exactly one output
        values.insert(&node.outputs[0], result);
    }

    graph
        .outputs()
        .iter()
        .map(|output| {
            let tensor = lookup(graph, &values, &output.name)?;
            // convert to standard layout so users get easily get &[f32] slices
            Ok(tensor.as_standard_layout().to_shared())
        })
        .collect()
}

fn lookup<'m>(graph: &'m Graph, values: &'m IndexMap<&str, Tensor>, name: &str) -> Result<&'m Tensor, OperationError> {
    if let Some(tensor) = values.get(name) {
        return Ok(tensor);
    }
    graph
        .constant(name)
        .ok_or_else(|| OperationError::UndefinedValue(name.to_owned()))
}

fn eval_node(node: &Node, operands: &[Tensor]) -> Result<Tensor, OperationError> {
    let invalid = |message: String| OperationError::Invalid {
        node: node.name.clone(),
        operation: format!("{:?}", node.operation),
        message,
    };

    let result = match &node.operation {
        Operation::Identity => operands[0].clone(),
        &Operation::Unary(op) => {
            let f: fn(f32) -> f32 = match op {
                UnaryOp::Relu => |x: f32| x.max(0.0),
                UnaryOp::Sigmoid => |x: f32| 1.0 / (1.0 + (-x).exp()),
                UnaryOp::Tanh => f32::tanh,
                UnaryOp::Exp => f32::exp,
                UnaryOp::Neg => |x: f32| -x,
                UnaryOp::Sqrt => f32::sqrt,
                UnaryOp::Abs => f32::abs,
            };
            operands[0].map(|&x| f(x)).into_shared()
        }
        &Operation::Binary(op) => {
            let left = &operands[0];
            let right = &operands[1];

            // ndarray panics on incompatible shapes, so check first
            if broadcast_shape(left.shape(), right.shape()).is_none() {
                return Err(invalid(format!(
                    "cannot broadcast {:?} and {:?}",
                    left.shape(),
                    right.shape()
                )));
            }

            let result = match op {
                BinaryOp::Add => left + right,
                BinaryOp::Sub => left - right,
                BinaryOp::Mul => left * right,
                BinaryOp::Div => left / right,
            };
            result.into_shared()
        }
        Operation::MatMul => {
            let left = as_matrix(&operands[0]).map_err(&invalid)?;
            let right = as_matrix(&operands[1]).map_err(&invalid)?;
            matmul(left, right).map_err(&invalid)?.into_dyn().into_shared()
        }
        &Operation::Gemm {
            alpha,
            beta,
            trans_a,
            trans_b,
        } => {
            let a = as_matrix(&operands[0]).map_err(&invalid)?;
            let b = as_matrix(&operands[1]).map_err(&invalid)?;
            let a = if trans_a { a.reversed_axes() } else { a };
            let b = if trans_b { b.reversed_axes() } else { b };

            let mut result = matmul(a, b).map_err(&invalid)?;
            if alpha != 1.0 {
                result *= alpha;
            }

            if let Some(c) = operands.get(2) {
                let c = c
                    .broadcast(result.raw_dim().into_dyn())
                    .ok_or_else(|| invalid(format!("cannot broadcast C {:?} to {:?}", c.shape(), result.shape())))?;
                let c = c
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| invalid(e.to_string()))?;
                result.scaled_add(beta, &c);
            }

            result.into_dyn().into_shared()
        }
        &Operation::Softmax { axis } => {
            let input = &operands[0];
            let axis = normalize_axis(axis, input.ndim()).ok_or_else(|| invalid(format!("invalid axis {}", axis)))?;
            softmax(input, Axis(axis))
        }
        &Operation::Flatten { axis } => {
            let input = &operands[0];
            let rank = input.ndim();
            // flatten allows axis == rank, which puts everything in the first dimension
            let axis = if axis < 0 { axis + rank as i64 } else { axis };
            if axis < 0 || axis > rank as i64 {
                return Err(invalid(format!("invalid axis {} for rank {}", axis, rank)));
            }
            let axis = axis as usize;

            let shape = input.shape();
            let new_shape: [usize; 2] = [shape[..axis].iter().product(), shape[axis..].iter().product()];
            reshape(input, &new_shape).map_err(&invalid)?
        }
        Operation::Reshape { shape, allow_zero } => {
            let input = &operands[0];
            let new_shape = resolve_reshape(input.shape(), shape, *allow_zero).map_err(&invalid)?;
            reshape(input, &new_shape).map_err(&invalid)?
        }
        Operation::Transpose { perm } => {
            let input = &operands[0];
            let perm = match perm {
                Some(perm) => perm.clone(),
                None => (0..input.ndim()).rev().collect_vec(),
            };
            if perm.len() != input.ndim() {
                return Err(invalid(format!(
                    "permutation {:?} does not match rank {}",
                    perm,
                    input.ndim()
                )));
            }
            input.view().permuted_axes(IxDyn(&perm)).to_shared()
        }
    };

    Ok(result)
}

fn as_matrix(tensor: &Tensor) -> Result<ArrayView2<f32>, String> {
    tensor
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| format!("expected a matrix, got shape {:?}", tensor.shape()))
}

fn matmul(left: ArrayView2<f32>, right: ArrayView2<f32>) -> Result<Array2<f32>, String> {
    if left.ncols() != right.nrows() {
        return Err(format!(
            "inner dimensions do not match: {:?} x {:?}",
            left.shape(),
            right.shape()
        ));
    }
    Ok(left.dot(&right))
}

fn reshape(input: &Tensor, new_shape: &[usize]) -> Result<Tensor, String> {
    input
        .as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(new_shape))
        .map(|t| t.into_shared())
        .map_err(|_| format!("cannot reshape {:?} into {:?}", input.shape(), new_shape))
}

/// The broadcast result shape of two shapes following numpy rules, or `None` if they are incompatible.
pub fn broadcast_shape(left: &[usize], right: &[usize]) -> Option<Vec<usize>> {
    let rank = left.len().max(right.len());
    let left_padded = std::iter::repeat(1).take(rank - left.len()).chain(left.iter().copied());
    let right_padded = std::iter::repeat(1).take(rank - right.len()).chain(right.iter().copied());

    left_padded
        .zip(right_padded)
        .map(|(l, r)| match (l, r) {
            (l, r) if l == r => Some(l),
            (1, r) => Some(r),
            (l, 1) => Some(l),
            _ => None,
        })
        .collect()
}

/// Compute the concrete target shape of a reshape, resolving `0` and `-1` entries.
pub fn resolve_reshape(input: &[usize], target: &[i64], allow_zero: bool) -> Result<Vec<usize>, String> {
    let total: usize = input.iter().product();

    let mut result = Vec::with_capacity(target.len());
    let mut infer_index = None;

    for (i, &d) in target.iter().enumerate() {
        let value = match d {
            -1 => {
                infer_index = Some(i);
                1
            }
            0 if !allow_zero => *input
                .get(i)
                .ok_or_else(|| format!("cannot copy dimension {} of {:?}", i, input))?,
            d if d >= 0 => d as usize,
            _ => return Err(format!("invalid reshape target {:?}", target)),
        };
        result.push(value);
    }

    if let Some(index) = infer_index {
        let known: usize = result.iter().product();
        if known == 0 || total % known != 0 {
            return Err(format!("cannot reshape {:?} into {:?}", input, target));
        }
        result[index] = total / known;
    }

    if result.iter().product::<usize>() != total {
        return Err(format!("cannot reshape {:?} into {:?}", input, target));
    }
    Ok(result)
}

fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let axis = if axis < 0 { axis + rank as i64 } else { axis };
    if (0..rank as i64).contains(&axis) {
        Some(axis as usize)
    } else {
        None
    }
}

/// Softmax along the given axis of the tensor.
/// The maximum is subtracted first so large inputs don't overflow.
pub fn softmax(array: &Tensor, axis: Axis) -> Tensor {
    let max = array
        .fold_axis(axis, f32::NEG_INFINITY, |&a, &x| a.max(x))
        .insert_axis(axis);

    let mut result = array - &max;
    result.mapv_inplace(f32::exp);
    let sum = result.sum_axis(axis).insert_axis(axis);
    result /= &sum;

    result.into_shared()
}
