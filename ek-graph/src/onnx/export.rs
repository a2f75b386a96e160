use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use prost::Message;

use crate::onnx::proto::attribute_proto::AttributeType;
use crate::onnx::proto::tensor_proto::DataType;
use crate::onnx::proto::tensor_shape_proto::{dimension, Dimension};
use crate::onnx::proto::{
    type_proto, AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, StringStringEntryProto,
    TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
};
use crate::onnx::result::{OnnxResult, ToOnnxLoadResult};
use crate::shape::{Shape, Size};

/// Incrementally build an ONNX model with float32 inputs, outputs and initializers.
///
/// Nothing is validated while building, the resulting bytes can be checked by loading them again.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    name: String,
    opset: i64,
    producer_name: String,
    producer_version: String,
    metadata: Vec<(String, String)>,

    inputs: Vec<ValueInfoProto>,
    outputs: Vec<ValueInfoProto>,
    initializers: Vec<TensorProto>,
    nodes: Vec<NodeProto>,
}

/// Handle to the node that was just added, used to attach attributes.
#[derive(Debug)]
pub struct NodeAttributes<'a> {
    node: &'a mut NodeProto,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>, opset: i64) -> Self {
        GraphBuilder {
            name: name.into(),
            opset,
            producer_name: env!("CARGO_PKG_NAME").to_owned(),
            producer_version: env!("CARGO_PKG_VERSION").to_owned(),
            metadata: vec![],
            inputs: vec![],
            outputs: vec![],
            initializers: vec![],
            nodes: vec![],
        }
    }

    pub fn opset(&self) -> i64 {
        self.opset
    }

    pub fn producer(&mut self, name: impl Into<String>, version: impl Into<String>) -> &mut Self {
        self.producer_name = name.into();
        self.producer_version = version.into();
        self
    }

    pub fn metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn input(&mut self, name: &str, shape: Shape) -> &mut Self {
        self.inputs.push(value_info(name, &shape));
        self
    }

    pub fn output(&mut self, name: &str, shape: Shape) -> &mut Self {
        self.outputs.push(value_info(name, &shape));
        self
    }

    /// Add a float32 initializer, `data` is in row-major order.
    pub fn initializer(&mut self, name: &str, dims: &[usize], data: &[f32]) -> &mut Self {
        assert_eq!(
            dims.iter().product::<usize>(),
            data.len(),
            "initializer '{}' dims {:?} do not match data length",
            name,
            dims
        );

        let mut raw_data = vec![0; data.len() * 4];
        LittleEndian::write_f32_into(data, &mut raw_data);

        self.initializers.push(TensorProto {
            dims: dims.iter().map(|&d| d as i64).collect(),
            data_type: DataType::Float as i32,
            name: name.to_owned(),
            raw_data,
            ..Default::default()
        });
        self
    }

    /// Add a rank-1 int64 initializer, typically used as the shape argument of a `Reshape`.
    pub fn int_initializer(&mut self, name: &str, data: &[i64]) -> &mut Self {
        self.initializers.push(TensorProto {
            dims: vec![data.len() as i64],
            data_type: DataType::Int64 as i32,
            name: name.to_owned(),
            int64_data: data.to_vec(),
            ..Default::default()
        });
        self
    }

    pub fn node(&mut self, op_type: &str, inputs: &[&str], outputs: &[&str]) -> NodeAttributes<'_> {
        let index = self.nodes.len();
        let name = format!("/{}_{}", op_type, index);
        self.nodes.push(NodeProto {
            input: inputs.iter().map(|&s| s.to_owned()).collect(),
            output: outputs.iter().map(|&s| s.to_owned()).collect(),
            name,
            op_type: op_type.to_owned(),
            ..Default::default()
        });

        NodeAttributes {
            node: &mut self.nodes[index],
        }
    }

    pub fn to_model(&self) -> ModelProto {
        let graph = GraphProto {
            node: self.nodes.clone(),
            name: self.name.clone(),
            initializer: self.initializers.clone(),
            input: self.inputs.clone(),
            output: self.outputs.clone(),
            ..Default::default()
        };

        ModelProto {
            ir_version: ir_version_for_opset(self.opset),
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: self.opset,
            }],
            producer_name: self.producer_name.clone(),
            producer_version: self.producer_version.clone(),
            graph: Some(graph),
            metadata_props: self
                .metadata
                .iter()
                .map(|(key, value)| StringStringEntryProto {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_model().encode_to_vec()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> OnnxResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()).to_onnx_result(path)
    }
}

impl NodeAttributes<'_> {
    pub fn int(self, name: &str, value: i64) -> Self {
        self.push(AttributeProto {
            name: name.to_owned(),
            r#type: AttributeType::Int as i32,
            i: value,
            ..Default::default()
        })
    }

    pub fn ints(self, name: &str, values: &[i64]) -> Self {
        self.push(AttributeProto {
            name: name.to_owned(),
            r#type: AttributeType::Ints as i32,
            ints: values.to_vec(),
            ..Default::default()
        })
    }

    pub fn float(self, name: &str, value: f32) -> Self {
        self.push(AttributeProto {
            name: name.to_owned(),
            r#type: AttributeType::Float as i32,
            f: value,
            ..Default::default()
        })
    }

    fn push(self, attribute: AttributeProto) -> Self {
        self.node.attribute.push(attribute);
        self
    }
}

/// The oldest IR version that supports the given default-domain opset,
/// see [Versioning](https://github.com/onnx/onnx/blob/main/docs/Versioning.md).
pub fn ir_version_for_opset(opset: i64) -> i64 {
    match opset {
        i64::MIN..=8 => 3,
        9 => 4,
        10 => 5,
        11 => 6,
        12..=14 => 7,
        15..=18 => 8,
        19..=20 => 9,
        _ => 10,
    }
}

fn value_info(name: &str, shape: &Shape) -> ValueInfoProto {
    let dim = shape
        .dims
        .iter()
        .map(|size| {
            let value = match size {
                Size::Fixed(value) => Some(dimension::Value::DimValue(*value as i64)),
                Size::Dynamic(Some(param)) => Some(dimension::Value::DimParam(param.clone())),
                Size::Dynamic(None) => None,
            };
            Dimension {
                value,
                ..Default::default()
            }
        })
        .collect();

    let tensor = type_proto::Tensor {
        elem_type: DataType::Float as i32,
        shape: Some(TensorShapeProto { dim }),
    };

    ValueInfoProto {
        name: name.to_owned(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(tensor)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_versions() {
        assert_eq!(ir_version_for_opset(7), 3);
        assert_eq!(ir_version_for_opset(11), 6);
        assert_eq!(ir_version_for_opset(13), 7);
        assert_eq!(ir_version_for_opset(17), 8);
        assert_eq!(ir_version_for_opset(21), 10);
    }

    #[test]
    fn node_attributes() {
        let mut builder = GraphBuilder::new("gemm", 13);
        builder.node("Gemm", &["x", "w"], &["y"]).int("transB", 1).float("alpha", 0.5);

        let model = builder.to_model();
        let graph = model.graph.unwrap();
        let node = &graph.node[0];

        assert_eq!(node.op_type, "Gemm");
        assert_eq!(node.name, "/Gemm_0");
        assert_eq!(node.attribute.len(), 2);
        assert_eq!(node.attribute[0].name, "transB");
        assert_eq!(node.attribute[0].i, 1);
        assert_eq!(node.attribute[1].f, 0.5);
    }

    #[test]
    fn raw_initializer_is_little_endian() {
        let mut builder = GraphBuilder::new("init", 13);
        builder.initializer("w", &[2], &[1.0, -2.0]);

        let model = builder.to_model();
        let tensor = &model.graph.unwrap().initializer[0];
        assert_eq!(tensor.raw_data, [1.0f32.to_le_bytes(), (-2.0f32).to_le_bytes()].concat());
        assert_eq!(tensor.dims, vec![2]);
    }
}
