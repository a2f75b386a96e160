use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::artifact::ModelArtifact;
use crate::error::{ConvertError, ConvertResult};
use crate::options::{ConvertConfig, ConvertOptions};
use crate::python::Python;
use crate::pytorch::PyTorchConverter;
use crate::tensorflow::TensorFlowConverter;
use crate::SourceFramework;

/// A conversion strategy for one source framework.
pub trait Converter: std::fmt::Debug {
    fn framework(&self) -> SourceFramework;

    /// Check that everything this converter needs is installed,
    /// failing with [ConvertError::MissingDependency] otherwise.
    fn check_available(&self) -> ConvertResult<()>;

    /// Export `artifact` to an ONNX file at `output_path`.
    ///
    /// Implementations must not leave a partial file at `output_path` on failure.
    fn export(&self, artifact: &ModelArtifact, output_path: &Path, options: &ConvertOptions) -> ConvertResult<ModelArtifact>;
}

/// Lookup table from source framework to converter.
#[derive(Debug)]
pub struct ConverterRegistry {
    converters: HashMap<SourceFramework, Box<dyn Converter>>,
}

impl ConverterRegistry {
    /// A registry with the PyTorch and TensorFlow converters.
    pub fn new(config: &ConvertConfig) -> Self {
        let python = Python::new(&config.python);

        let mut registry = ConverterRegistry::empty();
        registry.register(Box::new(PyTorchConverter::new(python.clone())));
        registry.register(Box::new(TensorFlowConverter::new(python)));
        registry
    }

    pub fn empty() -> Self {
        ConverterRegistry {
            converters: HashMap::new(),
        }
    }

    /// Add a converter, replacing any previous one for the same framework.
    pub fn register(&mut self, converter: Box<dyn Converter>) {
        self.converters.insert(converter.framework(), converter);
    }

    pub fn get(&self, framework: SourceFramework) -> ConvertResult<&dyn Converter> {
        self.converters
            .get(&framework)
            .map(|c| c.as_ref())
            .ok_or(ConvertError::NoConverter(framework))
    }

    /// Convert the model at `model_path` to an ONNX file at `output_path` with the given opset.
    pub fn convert(
        &self,
        framework: SourceFramework,
        model_path: &Path,
        output_path: &Path,
        target_version: i64,
        options: &ConvertOptions,
    ) -> ConvertResult<PathBuf> {
        if target_version <= 0 {
            return Err(ConvertError::InvalidOptions(format!(
                "the opset must be positive, got {}",
                target_version
            )));
        }

        let artifact = ModelArtifact::identify(model_path)?;
        let converter = self.get(framework)?;

        info!(
            "Converting {} '{}' ({}) to '{}' at opset {}",
            framework,
            model_path.display(),
            artifact.format(),
            output_path.display(),
            target_version
        );

        let options = ConvertOptions {
            opset: target_version,
            ..options.clone()
        };
        let result = converter.export(&artifact, output_path, &options)?;

        info!("Wrote '{}'", result.path().display());
        Ok(result.path().to_owned())
    }
}
