#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ek_graph::onnx::GraphBuilder;
use ek_graph::shape;
use ek_graph::shape::Size;

/// `relu(input @ weight^T + bias)` with input `[batch_size, 3]` and output `[batch_size, 2]`.
pub fn linear_model(dir: &Path, file_name: &str) -> PathBuf {
    let mut builder = GraphBuilder::new("linear", 13);
    builder.input("input", shape![Size::dynamic("batch_size"), 3]);
    builder.initializer("weight", &[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    builder.initializer("bias", &[2], &[0.5, -0.5]);
    builder
        .node("Gemm", &["input", "weight", "bias"], &["hidden"])
        .int("transB", 1);
    builder.node("Relu", &["hidden"], &["output"]);
    builder.output("output", shape![Size::dynamic("batch_size"), 2]);

    save(dir, file_name, &builder)
}

/// Declares an input of 4 features but multiplies with a weight expecting 3.
pub fn mismatched_model(dir: &Path, file_name: &str) -> PathBuf {
    let mut builder = GraphBuilder::new("mismatched", 13);
    builder.input("input", shape![1, 4]);
    builder.initializer("weight", &[2, 3], &[0.0; 6]);
    builder.node("Gemm", &["input", "weight"], &["output"]).int("transB", 1);
    builder.output("output", shape![1, 2]);

    save(dir, file_name, &builder)
}

/// A model without inputs whose single output is a constant.
pub fn constant_model(dir: &Path, file_name: &str) -> PathBuf {
    let mut builder = GraphBuilder::new("constant", 13);
    builder.node("Constant", &[], &["output"]).float("value_float", 2.0);
    builder.output("output", shape![]);

    save(dir, file_name, &builder)
}

/// A model with an input and a node, but no declared outputs.
pub fn outputless_model(dir: &Path, file_name: &str) -> PathBuf {
    let mut builder = GraphBuilder::new("outputless", 13);
    builder.input("input", shape![1, 3]);
    builder.node("Relu", &["input"], &["hidden"]);

    save(dir, file_name, &builder)
}

/// The linear model with a weight claiming more elements than fit in memory.
pub fn oversized_model(dir: &Path, file_name: &str) -> PathBuf {
    use prost::Message;

    let path = dir.join(file_name);
    let mut builder = GraphBuilder::new("oversized", 13);
    builder.input("input", shape![1, 3]);
    builder.initializer("weight", &[2, 3], &[0.0; 6]);
    builder.node("Gemm", &["input", "weight"], &["output"]).int("transB", 1);
    builder.output("output", shape![1, 2]);

    let mut model = builder.to_model();
    let graph = model.graph.as_mut().unwrap();
    graph.initializer[0].dims = vec![(1 << 62) + 1];
    std::fs::write(&path, model.encode_to_vec()).unwrap();
    path
}

fn save(dir: &Path, file_name: &str, builder: &GraphBuilder) -> PathBuf {
    let path = dir.join(file_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    builder.save(&path).unwrap();
    path
}
