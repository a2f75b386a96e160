use std::path::PathBuf;

use byteorder::{ByteOrder, LittleEndian};
use itertools::Itertools;
use ndarray::IxDyn;
use prost::Message;
use tracing::debug;

use crate::dtype::{DSize, DType, Tensor};
use crate::graph::{BinaryOp, Graph, Node as GraphNode, Operation, TensorSpec, UnaryOp};
use crate::onnx::external_data::{DenyExternalData, ExternalDataLoader, ExternalRange};
use crate::onnx::inputs::{Attributes, Inputs};
use crate::onnx::proto::tensor_proto::{DataLocation, DataType};
use crate::onnx::proto::tensor_shape_proto::dimension;
use crate::onnx::proto::type_proto::Value as ProtoTypeValue;
use crate::onnx::proto::{ModelProto, TensorProto, ValueInfoProto};
use crate::onnx::result::{Node, OnnxError, OnnxResult, UnwrapProto};
use crate::onnx::store::Store;
use crate::onnx::typed_value::TypedValue;
use crate::shape::{Shape, Size};

// we use &dyn to avoid duplicate codegen of this large and non-critical function
pub fn graph_from_onnx_bytes(buf: &[u8], external: &mut dyn ExternalDataLoader) -> OnnxResult<Graph> {
    let model = ModelProto::decode(buf)?;
    if model.ir_version <= 0 {
        return Err(OnnxError::MissingProtoField("model.ir_version"));
    }
    let model_graph = model.graph.as_ref().unwrap_proto("model.graph")?;

    let mut graph = Graph::new(&model_graph.name);
    graph.producer = model.producer_name.clone();
    graph.opset = model
        .opset_import
        .iter()
        .find(|o| o.domain.is_empty() || o.domain == "ai.onnx")
        .map(|o| o.version);
    graph.metadata = model
        .metadata_props
        .iter()
        .map(|entry| (entry.key.clone(), entry.value.clone()))
        .collect();

    debug!(
        "Loading graph '{}' (ir version {}, opset {:?}, producer '{}')",
        model_graph.name, model.ir_version, graph.opset, model.producer_name
    );

    let mut nodes: Store<TypedValue> = Store::default();

    // load initializer values (similar to constants but defined separately)
    for tensor in &model_graph.initializer {
        let value = define_tensor_data(&tensor.name, tensor, external)?;
        if let TypedValue::FloatConst(data) = &value {
            graph.push_constant(tensor.name.clone(), data.clone());
        }
        nodes.define(&tensor.name, value)?;
    }

    // load inputs
    for input in &model_graph.input {
        // initializers are allowed to re-appear in the inputs, so we skip them the second time
        if nodes.contains(&input.name) {
            continue;
        }

        let spec = resolve_value_info(input)?;
        graph.push_input(spec);
        nodes.define(&input.name, TypedValue::Runtime)?;
    }

    // load nodes
    for node_proto in &model_graph.node {
        let node = Node {
            name: node_proto.name.as_str(),
            op_type: node_proto.op_type.as_str(),
        };

        if !(node_proto.domain.is_empty() || node_proto.domain == "ai.onnx") {
            return Err(OnnxError::UnsupportedDomain(node.to_owned(), node_proto.domain.clone()));
        }

        let mut attrs = Attributes::from(node.clone(), &node_proto.attribute);
        let mut inputs = Inputs::from(node.clone(), &node_proto.input, &nodes)?;

        let visited = visit_node(node.clone(), graph.opset, &mut inputs, &mut attrs)?;

        // check that we used all attributes and inputs
        let leftover_attributes = attrs.leftover();
        if !leftover_attributes.is_empty() {
            return Err(OnnxError::LeftoverAttributes(node.to_owned(), leftover_attributes));
        }
        let leftover_inputs = inputs.leftover();
        if !leftover_inputs.is_empty() {
            return Err(OnnxError::LeftoverInputs(node.to_owned(), leftover_inputs));
        }

        // only the first output is ever produced, trailing optional outputs must be unused
        let output_names = node_proto.output.iter().filter(|s| !s.is_empty()).collect_vec();
        if output_names.len() != 1 {
            return Err(OnnxError::UnsupportedMultipleOutputs(
                node.to_owned(),
                node_proto.output.clone(),
            ));
        }
        let output_name = output_names[0];

        match visited {
            Visited::Constant(value) => {
                if let TypedValue::FloatConst(data) = &value {
                    graph.push_constant(output_name.clone(), data.clone());
                }
                nodes.define(output_name, value)?;
            }
            Visited::Operation(operation, operands) => {
                graph.push_node(GraphNode {
                    name: node_proto.name.clone(),
                    operation,
                    inputs: operands,
                    outputs: vec![output_name.clone()],
                });
                nodes.define(output_name, TypedValue::Runtime)?;
            }
        }
    }

    for output in &model_graph.output {
        match nodes.get(&output.name) {
            Some(TypedValue::Runtime | TypedValue::FloatConst(_)) => {}
            Some(TypedValue::IntConst { .. }) | None => return Err(OnnxError::UndefinedOutput(output.name.clone())),
        }

        let spec = resolve_value_info(output)?;
        graph.push_output(spec);
    }

    Ok(graph)
}

enum Visited {
    Constant(TypedValue),
    Operation(Operation, Vec<String>),
}

fn visit_node(
    node: Node<&str>,
    opset: Option<i64>,
    inputs: &mut Inputs,
    attrs: &mut Attributes,
) -> OnnxResult<Visited> {
    let operation = match node.op_type {
        "Constant" => {
            let value = if let Some(value) = attrs.maybe_take_float("value_float")? {
                TypedValue::FloatConst(scalar_tensor(value))
            } else if let Some(value) = attrs.maybe_take_int("value_int")? {
                TypedValue::IntConst { dims: vec![], data: vec![value] }
            } else if let Some(values) = attrs.maybe_take_ints("value_ints")? {
                TypedValue::IntConst { dims: vec![values.len()], data: values.to_vec() }
            } else {
                let tensor = attrs.take_tensor("value")?;
                define_tensor_data(node.name, tensor, &mut DenyExternalData)?
            };
            return Ok(Visited::Constant(value));
        }
        "Identity" => {
            let input = runtime_operand(&node, 0, inputs.required(0)?)?;
            return Ok(Visited::Operation(Operation::Identity, vec![input]));
        }
        "Dropout" => {
            // inference only, the ratio and training mode inputs are irrelevant
            let input = runtime_operand(&node, 0, inputs.required(0)?)?;
            let _ = inputs.optional(1)?;
            let _ = inputs.optional(2)?;
            attrs.ignore("seed");
            attrs.ignore("ratio");
            attrs.ignore("is_test");
            return Ok(Visited::Operation(Operation::Identity, vec![input]));
        }
        "Relu" | "Sigmoid" | "Tanh" | "Exp" | "Neg" | "Sqrt" | "Abs" => {
            let op = match node.op_type {
                "Relu" => UnaryOp::Relu,
                "Sigmoid" => UnaryOp::Sigmoid,
                "Tanh" => UnaryOp::Tanh,
                "Exp" => UnaryOp::Exp,
                "Neg" => UnaryOp::Neg,
                "Sqrt" => UnaryOp::Sqrt,
                "Abs" => UnaryOp::Abs,
                _ => unreachable!(),
            };
            Operation::Unary(op)
        }
        "Add" | "Sub" | "Mul" | "Div" => {
            let op = match node.op_type {
                "Add" => BinaryOp::Add,
                "Sub" => BinaryOp::Sub,
                "Mul" => BinaryOp::Mul,
                "Div" => BinaryOp::Div,
                _ => unreachable!(),
            };
            let left = runtime_operand(&node, 0, inputs.required(0)?)?;
            let right = runtime_operand(&node, 1, inputs.required(1)?)?;
            return Ok(Visited::Operation(Operation::Binary(op), vec![left, right]));
        }
        "MatMul" => {
            let left = runtime_operand(&node, 0, inputs.required(0)?)?;
            let right = runtime_operand(&node, 1, inputs.required(1)?)?;
            return Ok(Visited::Operation(Operation::MatMul, vec![left, right]));
        }
        "Gemm" => {
            let a = runtime_operand(&node, 0, inputs.required(0)?)?;
            let b = runtime_operand(&node, 1, inputs.required(1)?)?;
            let c = inputs.optional(2)?;

            let alpha = attrs.maybe_take_float("alpha")?.unwrap_or(1.0);
            let beta = attrs.maybe_take_float("beta")?.unwrap_or(1.0);
            let trans_a = attrs.maybe_take_bool("transA")?.unwrap_or(false);
            let trans_b = attrs.maybe_take_bool("transB")?.unwrap_or(false);

            let mut operands = vec![a, b];
            if let Some(c) = c {
                operands.push(runtime_operand(&node, 2, c)?);
            }

            let operation = Operation::Gemm {
                alpha,
                beta,
                trans_a,
                trans_b,
            };
            return Ok(Visited::Operation(operation, operands));
        }
        "Softmax" => {
            // the default axis changed in opset 13
            let default_axis = match opset {
                Some(opset) if opset < 13 => 1,
                _ => -1,
            };
            let axis = attrs.maybe_take_int("axis")?.unwrap_or(default_axis);
            Operation::Softmax { axis }
        }
        "Flatten" => {
            let axis = attrs.maybe_take_int("axis")?.unwrap_or(1);
            Operation::Flatten { axis }
        }
        "Reshape" => {
            let input = runtime_operand(&node, 0, inputs.required(0)?)?;
            let shape = inputs.required_int_const(1)?;
            let allow_zero = attrs.maybe_take_bool("allowzero")?.unwrap_or(false);

            if shape.iter().filter(|&&d| d == -1).count() > 1 || shape.iter().any(|&d| d < -1) {
                return Err(OnnxError::InvalidOperationArgs(
                    node.to_owned(),
                    format!("invalid reshape target {:?}", shape),
                ));
            }

            return Ok(Visited::Operation(
                Operation::Reshape { shape, allow_zero },
                vec![input],
            ));
        }
        "Transpose" => {
            let perm = match attrs.maybe_take_ints("perm")? {
                None => None,
                Some(perm) => {
                    let perm = perm.iter().map(|&p| p as usize).collect_vec();
                    let mut sorted = perm.clone();
                    sorted.sort_unstable();
                    if sorted != (0..perm.len()).collect_vec() {
                        return Err(OnnxError::InvalidOperationArgs(
                            node.to_owned(),
                            format!("invalid permutation {:?}", perm),
                        ));
                    }
                    Some(perm)
                }
            };
            Operation::Transpose { perm }
        }
        _ => return Err(OnnxError::UnsupportedOperation(node.to_owned())),
    };

    // all remaining operations have a single runtime operand
    let input = runtime_operand(&node, 0, inputs.required(0)?)?;
    Ok(Visited::Operation(operation, vec![input]))
}

/// Integer constants only exist at load time, so they can't be used as operands of runtime operations.
fn runtime_operand(node: &Node<&str>, index: usize, (name, value): (&str, &TypedValue)) -> OnnxResult<String> {
    match value {
        TypedValue::Runtime | TypedValue::FloatConst(_) => Ok(name.to_owned()),
        TypedValue::IntConst { .. } => Err(OnnxError::InvalidOperationArgs(
            node.to_owned(),
            format!("input {} ('{}') is an integer constant", index, name),
        )),
    }
}

fn scalar_tensor(value: f32) -> Tensor {
    Tensor::from_elem(IxDyn(&[]), value)
}

fn define_tensor_data(name: &str, tensor: &TensorProto, external: &mut dyn ExternalDataLoader) -> OnnxResult<TypedValue> {
    let data_location = DataLocation::try_from(tensor.data_location)
        .map_err(|_| OnnxError::InvalidEnumValue("tensor.data_location", tensor.data_location))?;

    // figure out the shape and type
    let dims = tensor
        .dims
        .iter()
        .map(|&d| usize::try_from(d).map_err(|_| OnnxError::NegativeDimension(name.to_owned(), d)))
        .collect::<OnnxResult<Vec<usize>>>()?;
    let dtype = resolve_dtype(tensor.data_type, name)?;

    let too_large = || OnnxError::TensorTooLarge(name.to_owned(), dims.clone());
    let size = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(too_large)?;
    let byte_size = size.checked_mul(dtype.size().bytes()).ok_or_else(too_large)?;

    // load the data
    let raw_data_slot;
    let raw_data: &[u8] = match data_location {
        DataLocation::Default => &tensor.raw_data,
        DataLocation::External => {
            // collect external data properties
            let mut location: Option<&str> = None;
            let mut offset: u64 = 0;
            let mut length: Option<usize> = None;

            for entry in &tensor.external_data {
                let key: &str = &entry.key;
                let value: &str = &entry.value;

                let invalid = || OnnxError::InvalidExternalData(key.to_owned(), value.to_owned());
                match key {
                    "location" => location = Some(value),
                    "offset" => offset = value.parse().map_err(|_| invalid())?,
                    "length" => length = Some(value.parse().map_err(|_| invalid())?),
                    "checksum" => {}
                    _ => return Err(invalid()),
                }
            }

            let location = location.ok_or_else(|| OnnxError::InvalidExternalData("location".to_owned(), String::new()))?;
            if let Some(length) = length {
                if length != byte_size {
                    return Err(OnnxError::DataLengthMismatch(name.to_owned(), byte_size, length));
                }
            }
            let range = ExternalRange {
                location: PathBuf::from(location),
                offset,
                length: byte_size,
            };
            raw_data_slot = external.read(&range)?;
            &raw_data_slot
        }
    };

    // raw data, if present, must exactly cover the tensor
    let use_raw = !raw_data.is_empty() || data_location == DataLocation::External;
    if use_raw && raw_data.len() != byte_size {
        return Err(OnnxError::DataLengthMismatch(name.to_owned(), byte_size, raw_data.len()));
    }

    macro_rules! read_ints {
        ($T:ty, $data:ident, $read:ident) => {{
            if use_raw {
                let mut data = vec![<$T>::default(); size];
                LittleEndian::$read(raw_data, &mut data);
                data.into_iter().map(|x| x as i64).collect_vec()
            } else {
                tensor.$data.iter().map(|&x| x as i64).collect_vec()
            }
        }};
    }

    // careful, this stuff is pretty weirdly mapped, see the TensorProto docs
    let value = match dtype {
        DType::F32 => {
            let data = if use_raw {
                let mut data = vec![0.0; size];
                LittleEndian::read_f32_into(raw_data, &mut data);
                data
            } else {
                tensor.float_data.clone()
            };
            TypedValue::FloatConst(float_tensor(name, dims, data)?)
        }
        DType::F64 => {
            let data = if use_raw {
                let mut data = vec![0.0; size];
                LittleEndian::read_f64_into(raw_data, &mut data);
                data.into_iter().map(|x| x as f32).collect_vec()
            } else {
                tensor.double_data.iter().map(|&x| x as f32).collect_vec()
            };
            TypedValue::FloatConst(float_tensor(name, dims, data)?)
        }
        DType::I(DSize::S8) | DType::U(DSize::S8) | DType::Bool => {
            let data = if use_raw {
                match dtype {
                    DType::I(_) => raw_data.iter().map(|&x| x as i8 as i64).collect_vec(),
                    _ => raw_data.iter().map(|&x| x as i64).collect_vec(),
                }
            } else {
                tensor.int32_data.iter().map(|&x| x as i64).collect_vec()
            };
            int_const(name, dims, data)?
        }
        DType::I(DSize::S16) => int_const(name, dims, read_ints!(i16, int32_data, read_i16_into))?,
        DType::I(DSize::S32) => int_const(name, dims, read_ints!(i32, int32_data, read_i32_into))?,
        DType::I(DSize::S64) => int_const(name, dims, read_ints!(i64, int64_data, read_i64_into))?,
        DType::U(DSize::S16) => int_const(name, dims, read_ints!(u16, int32_data, read_u16_into))?,
        DType::U(DSize::S32) => int_const(name, dims, read_ints!(u32, uint64_data, read_u32_into))?,
        DType::U(DSize::S64) => int_const(name, dims, read_ints!(u64, uint64_data, read_u64_into))?,
        DType::F16 | DType::BF16 => return Err(OnnxError::UnsupportedType(name.to_owned(), tensor.data_type)),
    };

    Ok(value)
}

fn float_tensor(name: &str, dims: Vec<usize>, data: Vec<f32>) -> OnnxResult<Tensor> {
    let expected: usize = dims.iter().product();
    let actual = data.len();
    Tensor::from_shape_vec(IxDyn(&dims), data).map_err(|_| OnnxError::DataLengthMismatch(name.to_owned(), expected, actual))
}

fn int_const(name: &str, dims: Vec<usize>, data: Vec<i64>) -> OnnxResult<TypedValue> {
    let expected: usize = dims.iter().product();
    if expected != data.len() {
        return Err(OnnxError::DataLengthMismatch(name.to_owned(), expected, data.len()));
    }
    Ok(TypedValue::IntConst { dims, data })
}

fn resolve_value_info(info: &ValueInfoProto) -> OnnxResult<TensorSpec> {
    let ty = info.r#type.as_ref().unwrap_proto("value_info.type")?;
    let value = ty
        .value
        .as_ref()
        .ok_or_else(|| OnnxError::UnsupportedValueKind(info.name.clone()))?;

    let spec = match value {
        ProtoTypeValue::TensorType(tensor) => {
            let dtype = resolve_dtype(tensor.elem_type, &info.name)?;

            let shape = tensor.shape.as_ref().map(|shape| {
                let dims = shape
                    .dim
                    .iter()
                    .map(|d| match d.value {
                        Some(dimension::Value::DimValue(value)) if value > 0 => Size::Fixed(value as usize),
                        Some(dimension::Value::DimParam(ref param)) if !param.is_empty() => Size::dynamic(param.clone()),
                        _ => Size::unnamed(),
                    })
                    .collect_vec();
                Shape::new(dims)
            });

            TensorSpec::new(info.name.clone(), shape, dtype)
        }
    };
    Ok(spec)
}

fn resolve_dtype(data_type: i32, name: &str) -> OnnxResult<DType> {
    let resolved = DataType::try_from(data_type).map_err(|_| OnnxError::UnsupportedType(name.to_owned(), data_type))?;

    let dtype = match resolved {
        DataType::Float => DType::F32,
        DataType::Double => DType::F64,
        DataType::Float16 => DType::F16,
        DataType::Bfloat16 => DType::BF16,
        DataType::Uint8 => DType::U(DSize::S8),
        DataType::Int8 => DType::I(DSize::S8),
        DataType::Uint16 => DType::U(DSize::S16),
        DataType::Int16 => DType::I(DSize::S16),
        DataType::Int32 => DType::I(DSize::S32),
        DataType::Int64 => DType::I(DSize::S64),
        DataType::Uint32 => DType::U(DSize::S32),
        DataType::Uint64 => DType::U(DSize::S64),
        DataType::Bool => DType::Bool,
        DataType::Undefined
        | DataType::String
        | DataType::Complex64
        | DataType::Complex128
        | DataType::Float8e4m3fn
        | DataType::Float8e4m3fnuz
        | DataType::Float8e5m2
        | DataType::Float8e5m2fnuz => return Err(OnnxError::UnsupportedType(name.to_owned(), data_type)),
    };
    Ok(dtype)
}
