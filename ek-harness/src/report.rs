use std::fmt::{Display, Formatter};

use ek_graph::dtype::DType;
use ek_graph::graph::TensorSpec;
use ek_graph::shape::Shape;
use indexmap::IndexMap;
use serde::Serialize;

/// The outcome of a single named check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IndexMap<String, TensorDetails>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorDetails {
    pub shape: Option<Shape>,
    pub dtype: DType,
}

/// Check results in the order the checks ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    checks: IndexMap<String, CheckResult>,
}

impl CheckResult {
    pub fn pass(message: impl Into<String>) -> Self {
        CheckResult {
            passed: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        CheckResult {
            passed: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_tensors(mut self, specs: &[TensorSpec]) -> Self {
        let details = specs
            .iter()
            .map(|spec| {
                let details = TensorDetails {
                    shape: spec.shape.clone(),
                    dtype: spec.dtype,
                };
                (spec.name.clone(), details)
            })
            .collect();
        self.details = Some(details);
        self
    }
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a check. Checks are never overwritten, a repeated name is a bug in the caller.
    pub fn insert(&mut self, name: &str, result: CheckResult) {
        let prev = self.checks.insert(name.to_owned(), result);
        debug_assert!(prev.is_none(), "check '{}' recorded twice", name);
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.get(name)
    }

    pub fn all_passed(&self) -> bool {
        self.checks.values().all(|c| c.passed)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckResult)> {
        self.checks.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, check) in self.iter() {
            let status = if check.passed { "PASS" } else { "FAIL" };
            writeln!(f, "[{}] {}: {}", status, name, check.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ek_graph::shape;
    use ek_graph::shape::Size;

    use super::*;

    #[test]
    fn empty_report_passes() {
        let report = ValidationReport::new();
        assert!(report.is_empty());
        assert!(report.all_passed());
    }

    #[test]
    fn one_failure_fails_all() {
        let mut report = ValidationReport::new();
        report.insert("a", CheckResult::pass("ok"));
        report.insert("b", CheckResult::fail("broken"));
        assert!(!report.all_passed());
        assert_eq!(report.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(report.to_string(), "[PASS] a: ok\n[FAIL] b: broken\n");
    }

    #[test]
    fn json_layout() {
        let spec = TensorSpec::new("input", Some(shape![Size::dynamic("batch_size"), 10]), DType::F32);

        let mut report = ValidationReport::new();
        report.insert("model_loaded", CheckResult::pass("Model loaded successfully"));
        report.insert("model_inputs", CheckResult::pass("Found 1 inputs").with_tensors(&[spec]));

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model_loaded": {"passed": true, "message": "Model loaded successfully"},
                "model_inputs": {
                    "passed": true,
                    "message": "Found 1 inputs",
                    "details": {"input": {"shape": ["batch_size", 10], "dtype": "float32"}},
                },
            })
        );
    }
}
