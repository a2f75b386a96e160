use ek_graph::dtype::DType;
use ek_graph::graph::{Operation, UnaryOp};
use ek_graph::onnx::result::OnnxError;
use ek_graph::onnx::{load_graph_from_onnx_bytes, load_graph_from_onnx_path, GraphBuilder};
use ek_graph::shape;
use ek_graph::shape::Size;

fn linear_builder() -> GraphBuilder {
    let mut builder = GraphBuilder::new("linear", 13);
    builder.input("input", shape![Size::dynamic("batch_size"), 3]);
    builder.initializer("weight", &[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    builder.initializer("bias", &[2], &[0.5, -0.5]);
    builder
        .node("Gemm", &["input", "weight", "bias"], &["hidden"])
        .int("transB", 1);
    builder.node("Relu", &["hidden"], &["output"]);
    builder.output("output", shape![Size::dynamic("batch_size"), 2]);
    builder
}

#[test]
fn load_built_linear() {
    let graph = load_graph_from_onnx_bytes(&linear_builder().to_bytes()).unwrap();

    assert_eq!(graph.name, "linear");
    assert_eq!(graph.opset, Some(13));
    assert_eq!(graph.producer, "ek-graph");

    assert_eq!(graph.inputs().len(), 1);
    let input = &graph.inputs()[0];
    assert_eq!(input.name, "input");
    assert_eq!(input.dtype, DType::F32);
    assert_eq!(input.shape.as_ref().unwrap().to_string(), "[batch_size, 3]");

    assert_eq!(graph.outputs()[0].shape.as_ref().unwrap().to_string(), "[batch_size, 2]");

    assert_eq!(graph.parameter_count(), 8);
    assert_eq!(graph.constant("weight").unwrap().shape(), &[2, 3]);

    let nodes = graph.nodes();
    assert_eq!(nodes.len(), 2);
    assert_eq!(
        nodes[0].operation,
        Operation::Gemm {
            alpha: 1.0,
            beta: 1.0,
            trans_a: false,
            trans_b: true,
        }
    );
    assert_eq!(nodes[0].inputs, vec!["input", "weight", "bias"]);
    assert_eq!(nodes[1].operation, Operation::Unary(UnaryOp::Relu));
}

#[test]
fn load_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.onnx");
    linear_builder().save(&path).unwrap();

    let graph = load_graph_from_onnx_path(&path, false).unwrap();
    assert_eq!(graph.nodes().len(), 2);
}

#[test]
fn missing_file() {
    let result = load_graph_from_onnx_path("does/not/exist.onnx", false);
    assert!(matches!(result, Err(OnnxError::IO(_, _))));
}

#[test]
fn garbage_is_malformed() {
    let error = load_graph_from_onnx_bytes(b"INVALID_MODEL_DATA").unwrap_err();
    assert!(error.is_malformed(), "{:?}", error);

    let error = load_graph_from_onnx_bytes(&[]).unwrap_err();
    assert!(error.is_malformed(), "{:?}", error);
}

#[test]
fn unsupported_operation() {
    let mut builder = GraphBuilder::new("conv", 13);
    builder.input("x", shape![1, 3, 8, 8]);
    builder.node("Conv", &["x"], &["y"]);
    builder.output("y", shape![1, 3, 8, 8]);

    let error = load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap_err();
    assert!(matches!(error, OnnxError::UnsupportedOperation(ref node) if node.op_type == "Conv"));
    assert!(!error.is_malformed());
}

#[test]
fn undefined_output() {
    let mut builder = GraphBuilder::new("broken", 13);
    builder.input("x", shape![4]);
    builder.output("nowhere", shape![4]);

    let error = load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap_err();
    assert!(matches!(error, OnnxError::UndefinedOutput(ref name) if name == "nowhere"));
}

#[test]
fn reshape_folds_shape_constant() {
    let mut builder = GraphBuilder::new("reshape", 13);
    builder.input("x", shape![2, 6]);
    builder.int_initializer("target", &[3, -1]);
    builder.node("Reshape", &["x", "target"], &["y"]);
    builder.output("y", shape![3, 4]);

    let graph = load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap();
    assert_eq!(
        graph.nodes()[0].operation,
        Operation::Reshape {
            shape: vec![3, -1],
            allow_zero: false,
        }
    );
    assert_eq!(graph.nodes()[0].inputs, vec!["x"]);
    // integer constants never become runtime values
    assert!(graph.constants().is_empty());
}

#[test]
fn softmax_default_axis_depends_on_opset() {
    for (opset, expected) in [(11, 1), (13, -1)] {
        let mut builder = GraphBuilder::new("softmax", opset);
        builder.input("x", shape![1, 10]);
        builder.node("Softmax", &["x"], &["y"]);
        builder.output("y", shape![1, 10]);

        let graph = load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap();
        assert_eq!(graph.nodes()[0].operation, Operation::Softmax { axis: expected });
    }
}

#[test]
fn leftover_attribute() {
    let mut builder = GraphBuilder::new("relu", 13);
    builder.input("x", shape![4]);
    builder.node("Relu", &["x"], &["y"]).int("bogus", 3);
    builder.output("y", shape![4]);

    let error = load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap_err();
    assert!(matches!(error, OnnxError::LeftoverAttributes(_, ref attrs) if attrs == &["bogus"]));
}

#[test]
fn external_initializer() {
    use ek_graph::onnx::proto::tensor_proto::DataLocation;
    use ek_graph::onnx::proto::StringStringEntryProto;
    use prost::Message;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.onnx");

    // move the weight into a side file
    let mut model = linear_builder().to_model();
    let graph = model.graph.as_mut().unwrap();
    let weight = graph.initializer.iter_mut().find(|t| t.name == "weight").unwrap();
    std::fs::write(dir.path().join("weights.bin"), std::mem::take(&mut weight.raw_data)).unwrap();
    weight.data_location = DataLocation::External as i32;
    weight.external_data = vec![StringStringEntryProto {
        key: "location".to_owned(),
        value: "weights.bin".to_owned(),
    }];
    std::fs::write(&path, model.encode_to_vec()).unwrap();

    let graph = load_graph_from_onnx_path(&path, true).unwrap();
    let weight = graph.constant("weight").unwrap();
    assert_eq!(weight.shape(), &[2, 3]);
    assert_eq!(weight.as_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let error = load_graph_from_onnx_path(&path, false).unwrap_err();
    assert!(matches!(error, OnnxError::ExternalDataNotAllowed(_)));
}

#[test]
fn overflowing_initializer_dims() {
    use prost::Message;

    let mut model = linear_builder().to_model();
    let graph = model.graph.as_mut().unwrap();
    let weight = graph.initializer.iter_mut().find(|t| t.name == "weight").unwrap();
    weight.dims = vec![(1 << 62) + 1];
    weight.raw_data = vec![0; 4];

    let error = load_graph_from_onnx_bytes(&model.encode_to_vec()).unwrap_err();
    assert!(matches!(error, OnnxError::TensorTooLarge(ref name, _) if name == "weight"));
    assert!(error.is_malformed());

    // overflows only once multiplied by the element size
    let graph = model.graph.as_mut().unwrap();
    graph.initializer.iter_mut().find(|t| t.name == "weight").unwrap().dims = vec![1 << 62];
    let error = load_graph_from_onnx_bytes(&model.encode_to_vec()).unwrap_err();
    assert!(matches!(error, OnnxError::TensorTooLarge(_, _)));
}

#[test]
fn bogus_external_lengths() {
    use ek_graph::onnx::proto::tensor_proto::DataLocation;
    use ek_graph::onnx::proto::StringStringEntryProto;
    use prost::Message;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.onnx");
    std::fs::write(dir.path().join("weights.bin"), [0u8; 24]).unwrap();

    let save = |dims: Vec<i64>, length: Option<&str>| {
        let mut model = linear_builder().to_model();
        let graph = model.graph.as_mut().unwrap();
        let weight = graph.initializer.iter_mut().find(|t| t.name == "weight").unwrap();
        weight.dims = dims;
        weight.raw_data.clear();
        weight.data_location = DataLocation::External as i32;
        weight.external_data = vec![StringStringEntryProto {
            key: "location".to_owned(),
            value: "weights.bin".to_owned(),
        }];
        if let Some(length) = length {
            weight.external_data.push(StringStringEntryProto {
                key: "length".to_owned(),
                value: length.to_owned(),
            });
        }
        std::fs::write(&path, model.encode_to_vec()).unwrap();
    };

    // the declared length must match the tensor before anything is read
    save(vec![2, 3], Some("9223372036854775807"));
    let error = load_graph_from_onnx_path(&path, true).unwrap_err();
    assert!(matches!(error, OnnxError::DataLengthMismatch(_, 24, 9223372036854775807)));

    // a huge but consistent tensor is bounded by the size of the data file
    save(vec![1 << 40], None);
    let error = load_graph_from_onnx_path(&path, true).unwrap_err();
    assert!(matches!(error, OnnxError::IO(_, _)), "{:?}", error);

    save(vec![2, 3], Some("24"));
    let graph = load_graph_from_onnx_path(&path, true).unwrap();
    assert_eq!(graph.constant("weight").unwrap().shape(), &[2, 3]);
}
