use std::path::{Path, PathBuf};

use ek_convert::{ConvertConfig, ConvertError, ConvertOptions, ConverterRegistry, SourceFramework};
use ek_graph::dtype::Tensor;
use ek_runtime::{Device, Session};
use safetensors::tensor::TensorView;
use safetensors::Dtype;

fn write_safetensors(path: &Path, params: &[(&str, Vec<usize>, Vec<f32>)]) {
    let views = params
        .iter()
        .map(|(name, shape, data)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytemuck::cast_slice(data)).unwrap();
            (name.to_string(), view)
        })
        .collect::<Vec<_>>();
    let bytes = safetensors::tensor::serialize(views, &None).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn broken_python() -> ConverterRegistry {
    ConverterRegistry::new(&ConvertConfig {
        python: PathBuf::from("/definitely/not/a/python"),
    })
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn safetensors_mlp_matches_reference() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("mlp.safetensors");
    let output_path = dir.path().join("mlp.onnx");

    // Linear(2, 2) -> ReLU -> Linear(2, 1)
    write_safetensors(
        &model_path,
        &[
            ("0.weight", vec![2, 2], vec![1.0, -1.0, 2.0, 0.0]),
            ("0.bias", vec![2], vec![0.0, 1.0]),
            ("2.weight", vec![1, 2], vec![1.0, 1.0]),
            ("2.bias", vec![1], vec![-0.5]),
        ],
    );

    let registry = ConverterRegistry::new(&ConvertConfig::default());
    let result = registry
        .convert(
            SourceFramework::PyTorch,
            &model_path,
            &output_path,
            13,
            &ConvertOptions::default(),
        )
        .unwrap();
    assert_eq!(result, output_path);

    let session = Session::load(&output_path, Device::Cpu).unwrap();
    assert_eq!(session.graph().opset, Some(13));
    assert_eq!(session.graph().producer, "edgekit");
    assert_eq!(session.graph().metadata["source"], "mlp.safetensors");

    let input = Tensor::from_shape_vec(vec![2, 2], vec![3.0, 1.0, -1.0, 2.0]).unwrap();
    let outputs = session.run(&[input]).unwrap();

    // row 0: hidden = relu([3 - 1, 6 + 1]) = [2, 7], out = 9 - 0.5
    // row 1: hidden = relu([-1 - 2, -2 + 1]) = [0, 0], out = -0.5
    assert_eq!(outputs[0].shape(), &[2, 1]);
    assert_eq!(outputs[0].as_slice().unwrap(), &[8.5, -0.5]);
}

#[test]
fn failure_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("bad.safetensors");
    let output_path = dir.path().join("bad.onnx");

    write_safetensors(
        &model_path,
        &[
            ("0.weight", vec![4, 2], vec![0.0; 8]),
            ("1.weight", vec![1, 3], vec![0.0; 3]),
        ],
    );

    let registry = ConverterRegistry::new(&ConvertConfig::default());
    let result = registry.convert(
        SourceFramework::PyTorch,
        &model_path,
        &output_path,
        13,
        &ConvertOptions::default(),
    );

    assert!(matches!(result, Err(ConvertError::ConversionFailure(_))));
    assert!(!output_path.exists());
    assert_eq!(dir_entries(dir.path()), vec!["bad.safetensors"]);
}

#[test]
fn checkpoint_without_torch() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.pt");
    std::fs::write(&model_path, b"not really a checkpoint").unwrap();
    let output_path = dir.path().join("model.onnx");

    let result = broken_python().convert(
        SourceFramework::PyTorch,
        &model_path,
        &output_path,
        13,
        &ConvertOptions::default(),
    );

    assert!(matches!(
        result,
        Err(ConvertError::MissingDependency {
            framework: SourceFramework::PyTorch,
            ..
        })
    ));
    assert_eq!(dir_entries(dir.path()), vec!["model.pt"]);
}

#[test]
fn saved_model_without_tensorflow() {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("saved_model");
    std::fs::create_dir(&model_dir).unwrap();
    let output_path = dir.path().join("model.onnx");

    let result = broken_python().convert(
        SourceFramework::TensorFlow,
        &model_dir,
        &output_path,
        13,
        &ConvertOptions::default(),
    );

    match result {
        Err(ConvertError::MissingDependency { framework, hint }) => {
            assert_eq!(framework, SourceFramework::TensorFlow);
            assert!(hint.contains("tf2onnx"));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(!output_path.exists());
}

#[test]
fn missing_model() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ConverterRegistry::new(&ConvertConfig::default());
    let result = registry.convert(
        SourceFramework::PyTorch,
        &dir.path().join("nothing.pt"),
        &dir.path().join("nothing.onnx"),
        13,
        &ConvertOptions::default(),
    );
    assert!(matches!(result, Err(ConvertError::NotFound(_))));
}

#[test]
fn wrong_framework_for_format() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.h5");
    std::fs::write(&model_path, b"").unwrap();

    let result = broken_python().convert(
        SourceFramework::PyTorch,
        &model_path,
        &dir.path().join("model.onnx"),
        13,
        &ConvertOptions::default(),
    );
    assert!(matches!(result, Err(ConvertError::FormatMismatch { .. })));
}
