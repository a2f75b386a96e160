use std::path::{Path, PathBuf};

use assert_cmd::Command;
use ek_graph::onnx::GraphBuilder;
use ek_graph::shape;
use ek_graph::shape::Size;
use predicates::prelude::*;
use safetensors::tensor::TensorView;
use safetensors::Dtype;

fn edgekit() -> Command {
    let mut command = Command::cargo_bin("edgekit").unwrap();
    command.env_remove("RUST_LOG");
    command
}

fn linear_model(path: &Path) {
    let mut builder = GraphBuilder::new("linear", 13);
    builder.input("input", shape![Size::dynamic("batch_size"), 3]);
    builder.initializer("weight", &[2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    builder.node("Gemm", &["input", "weight"], &["output"]).int("transB", 1);
    builder.output("output", shape![Size::dynamic("batch_size"), 2]);
    builder.save(path).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_model_passes() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("linear.onnx");
    let report = dir.path().join("report.json");
    linear_model(&model);

    edgekit()
        .arg("test-model")
        .arg(&model)
        .arg("--output-json")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("All 4 checks passed"));

    let json = read_json(&report);
    assert_eq!(json.as_object().unwrap().len(), 4);
    assert!(json["inference_test"]["passed"].as_bool().unwrap());
}

#[test]
fn test_model_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("corrupt.onnx");
    std::fs::write(&model, b"INVALID_MODEL_DATA").unwrap();

    edgekit()
        .arg("test-model")
        .arg(&model)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("model_loaded"))
        .stdout(predicate::str::contains("FAIL"));
}

#[test]
fn missing_path_is_usage_error() {
    edgekit()
        .args(["test-model", "/definitely/not/here.onnx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn convert_then_benchmark() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("mlp.safetensors");
    let model = dir.path().join("mlp.onnx");
    let results = dir.path().join("results.json");

    let w0: Vec<f32> = (0..32).map(|i| i as f32 * 0.01).collect();
    let w1: Vec<f32> = (0..16).map(|i| i as f32 * -0.01).collect();
    let views = vec![
        ("0.weight".to_owned(), TensorView::new(Dtype::F32, vec![8, 4], bytemuck::cast_slice(&w0)).unwrap()),
        ("2.weight".to_owned(), TensorView::new(Dtype::F32, vec![2, 8], bytemuck::cast_slice(&w1)).unwrap()),
    ];
    std::fs::write(&checkpoint, safetensors::tensor::serialize(views, &None).unwrap()).unwrap();

    edgekit()
        .args(["convert", "pytorch"])
        .arg(&checkpoint)
        .arg(&model)
        .args(["--option", "activation=tanh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Model converted successfully"));
    assert!(model.exists());

    edgekit()
        .arg("benchmark")
        .arg(&model)
        .args(["-i", "16,4", "--warmup", "1", "--runs", "3", "--samples", "--json"])
        .arg(&results)
        .assert()
        .success();

    let json = read_json(&results);
    assert_eq!(json["sample_count"], 3);
    assert!(json["latency"]["p95_ms"].is_number());
}

#[test]
fn convert_format_check() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("model.pt");
    std::fs::write(&checkpoint, b"").unwrap();

    edgekit()
        .args(["convert", "keras"])
        .arg(&checkpoint)
        .args(["--python", "/definitely/not/a/python"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error: "));
    assert!(!dir.path().join("model.onnx").exists());
}

#[test]
fn compare_identical_models() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = ["a", "b"]
        .iter()
        .map(|sub| {
            let path = dir.path().join(sub).join("model.onnx");
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            linear_model(&path);
            path
        })
        .collect();
    let results = dir.path().join("results.json");

    edgekit()
        .arg("benchmark")
        .args(&paths)
        .args(["--runs", "2", "--compare", "--json"])
        .arg(&results)
        .assert()
        .success();

    let json = read_json(&results);
    let names = json.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
    assert_eq!(names, vec!["model".to_owned(), "model (2)".to_owned()]);
}

#[test]
fn inspect_prints_graph() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("linear.onnx");
    linear_model(&model);

    edgekit()
        .arg("inspect")
        .arg(&model)
        .assert()
        .success()
        .stdout(predicate::str::contains("input: float32 [batch_size, 3]"))
        .stdout(predicate::str::contains("1 tensors, 6 parameters"));
}
