use std::path::PathBuf;

use crate::artifact::ArtifactFormat;
use crate::SourceFramework;

pub type ConvertResult<T> = Result<T, ConvertError>;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("model path '{}' does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("cannot infer the model format of '{}'", .0.display())]
    UnknownFormat(PathBuf),
    #[error("expected a {expected} model, but '{}' is a {actual}", path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: ArtifactFormat,
        actual: ArtifactFormat,
    },
    #[error("{framework} is not available. {hint}")]
    MissingDependency { framework: SourceFramework, hint: String },
    #[error("no converter registered for {0}")]
    NoConverter(SourceFramework),
    #[error("invalid conversion options: {0}")]
    InvalidOptions(String),
    #[error("conversion failed: {0}")]
    ConversionFailure(String),
}

impl ConvertError {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        ConvertError::ConversionFailure(message.into())
    }
}
