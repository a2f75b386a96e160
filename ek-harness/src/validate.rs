use std::path::Path;

use ek_runtime::{Device, LoadError, Session};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::inputs::random_inputs;
use crate::report::{CheckResult, ValidationReport};

pub const MODEL_LOADED: &str = "model_loaded";
pub const MODEL_INPUTS: &str = "model_inputs";
pub const MODEL_OUTPUTS: &str = "model_outputs";
pub const INFERENCE_TEST: &str = "inference_test";

/// Load the model at `path` and run the structural checks and a single synthetic inference on it.
///
/// Only a load failure is returned as an error, every later failure is recorded in the report.
pub fn validate(path: impl AsRef<Path>) -> Result<ValidationReport, LoadError> {
    validate_with_rng(path, &mut StdRng::from_entropy())
}

pub fn validate_with_rng(path: impl AsRef<Path>, rng: &mut impl Rng) -> Result<ValidationReport, LoadError> {
    let path = path.as_ref();
    let session = Session::load(path, Device::Cpu)?;
    info!("Validating '{}'", path.display());
    Ok(validate_session(&session, rng))
}

/// Run the checks that follow a successful load. They are independent of each other.
pub fn validate_session(session: &Session, rng: &mut impl Rng) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.insert(MODEL_LOADED, CheckResult::pass("Model loaded successfully"));
    report.insert(MODEL_INPUTS, check_io("input", session.inputs()));
    report.insert(MODEL_OUTPUTS, check_io("output", session.outputs()));
    report.insert(INFERENCE_TEST, check_inference(session, rng));
    report
}

/// The report for a model that could not be loaded at all.
pub fn load_failure_report(error: &LoadError) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.insert(MODEL_LOADED, CheckResult::fail(format!("Failed to load model: {}", error)));
    report
}

fn check_io(kind: &str, specs: &[ek_graph::graph::TensorSpec]) -> CheckResult {
    let result = if specs.is_empty() {
        CheckResult::fail(format!("Model declares no {}s", kind))
    } else if let Some(index) = specs.iter().position(|s| s.name.is_empty()) {
        CheckResult::fail(format!("{} {} has an empty name", kind, index))
    } else {
        CheckResult::pass(format!("Found {} {}s", specs.len(), kind))
    };
    result.with_tensors(specs)
}

fn check_inference(session: &Session, rng: &mut impl Rng) -> CheckResult {
    let inputs = match random_inputs(rng, session.inputs()) {
        Ok(inputs) => inputs,
        Err(message) => return CheckResult::fail(format!("Cannot generate inputs: {}", message)),
    };

    match session.run(&inputs) {
        Ok(outputs) if outputs.len() == session.outputs().len() => {
            debug!(
                "Synthetic inference produced shapes {:?}",
                outputs.iter().map(|o| o.shape().to_vec()).collect::<Vec<_>>()
            );
            CheckResult::pass("Inference successful")
        }
        Ok(outputs) => CheckResult::fail(format!(
            "Inference produced {} outputs, expected {}",
            outputs.len(),
            session.outputs().len()
        )),
        Err(e) => CheckResult::fail(format!("Inference failed: {}", e)),
    }
}
