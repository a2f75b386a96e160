use ek_graph::dtype::Tensor;
use ek_graph::onnx::GraphBuilder;
use ek_graph::shape;
use ek_graph::shape::Size;
use ek_runtime::{Device, LoadError, RunError, Session};
use indexmap::IndexMap;

fn write_model(dir: &std::path::Path, builder: &GraphBuilder) -> std::path::PathBuf {
    let path = dir.join("model.onnx");
    builder.save(&path).unwrap();
    path
}

fn linear_relu() -> GraphBuilder {
    let mut builder = GraphBuilder::new("linear", 13);
    builder.input("input", shape![Size::dynamic("batch_size"), 3]);
    // weight is [out, in] like a torch linear layer
    builder.initializer("weight", &[2, 3], &[1.0, 0.0, -1.0, 0.5, 0.5, 0.5]);
    builder.initializer("bias", &[2], &[0.0, -1.0]);
    builder
        .node("Gemm", &["input", "weight", "bias"], &["hidden"])
        .int("transB", 1);
    builder.node("Relu", &["hidden"], &["output"]);
    builder.output("output", shape![Size::dynamic("batch_size"), 2]);
    builder
}

#[test]
fn gemm_relu() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), &linear_relu());
    let session = Session::load(&path, Device::Cpu).unwrap();

    let input = Tensor::from_shape_vec(vec![2, 3], vec![1.0, 2.0, 3.0, -1.0, -2.0, -3.0]).unwrap();
    let outputs = session.run(&[input]).unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].shape(), &[2, 2]);
    // row 0: [1 - 3, 0.5 * 6 - 1] = [-2, 2] -> relu -> [0, 2]
    // row 1: [-1 + 3, 0.5 * -6 - 1] = [2, -4] -> relu -> [2, 0]
    assert_eq!(outputs[0].as_slice().unwrap(), &[0.0, 2.0, 2.0, 0.0]);
}

#[test]
fn run_named() {
    let session = Session::from_graph(
        ek_graph::onnx::load_graph_from_onnx_bytes(&linear_relu().to_bytes()).unwrap(),
        Device::Cpu,
    )
    .unwrap();

    let mut inputs = IndexMap::new();
    inputs.insert("input".to_owned(), Tensor::zeros(vec![4, 3]));
    let outputs = session.run_named(inputs).unwrap();

    assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["output"]);
    assert_eq!(outputs["output"].shape(), &[4, 2]);

    let mut wrong = IndexMap::new();
    wrong.insert("input".to_owned(), Tensor::zeros(vec![4, 3]));
    wrong.insert("extra".to_owned(), Tensor::zeros(vec![1]));
    assert!(matches!(session.run_named(wrong), Err(RunError::UnknownInput(name)) if name == "extra"));

    let mut misnamed = IndexMap::new();
    misnamed.insert("x".to_owned(), Tensor::zeros(vec![4, 3]));
    let error = session.run_named(misnamed).unwrap_err();
    assert!(matches!(error, RunError::MissingInput(ref name) if name == "input"));
    assert_eq!(error.to_string(), "missing value for input 'input'");
}

#[test]
fn wrong_input_shape() {
    let session = Session::from_graph(
        ek_graph::onnx::load_graph_from_onnx_bytes(&linear_relu().to_bytes()).unwrap(),
        Device::Cpu,
    )
    .unwrap();

    let result = session.run(&[Tensor::zeros(vec![1, 4])]);
    assert!(matches!(result, Err(RunError::InputShape { .. })));

    let result = session.run(&[]);
    assert!(matches!(result, Err(RunError::InputCount { expected: 1, actual: 0 })));
}

#[test]
fn not_found() {
    let result = Session::load("definitely/missing/model.onnx", Device::Cpu);
    assert!(matches!(result, Err(LoadError::NotFound(_))));
}

#[test]
fn corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");
    std::fs::write(&path, b"INVALID_MODEL_DATA").unwrap();

    let result = Session::load(&path, Device::Cpu);
    assert!(matches!(result, Err(LoadError::Corrupt { .. })));
}

#[test]
fn unsupported_operation() {
    let mut builder = GraphBuilder::new("conv", 13);
    builder.input("x", shape![1, 3, 8, 8]);
    builder.node("Conv", &["x"], &["y"]);
    builder.output("y", shape![1, 3, 8, 8]);

    let dir = tempfile::tempdir().unwrap();
    let path = write_model(dir.path(), &builder);

    let result = Session::load(&path, Device::Cpu);
    assert!(matches!(result, Err(LoadError::Unsupported { .. })));
}

#[test]
fn softmax_flatten_transpose() {
    let mut builder = GraphBuilder::new("mixed", 13);
    builder.input("x", shape![2, 3, 2]);
    builder.node("Transpose", &["x"], &["t"]).ints("perm", &[0, 2, 1]);
    builder.node("Flatten", &["t"], &["f"]);
    builder.node("Softmax", &["f"], &["y"]);
    builder.output("y", shape![2, 6]);

    let graph = ek_graph::onnx::load_graph_from_onnx_bytes(&builder.to_bytes()).unwrap();
    let session = Session::from_graph(graph, Device::Cpu).unwrap();

    let data: Vec<f32> = (0..12).map(|x| x as f32).collect();
    let input = Tensor::from_shape_vec(vec![2, 3, 2], data).unwrap();
    let outputs = session.run(&[input]).unwrap();

    let output = &outputs[0];
    assert_eq!(output.shape(), &[2, 6]);
    for row in output.outer_iter() {
        assert!((row.sum() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn accelerator_falls_back_to_cpu() {
    assert_eq!(Device::select(true), Device::Cpu);
    assert_eq!(Device::select(false), Device::Cpu);
}
