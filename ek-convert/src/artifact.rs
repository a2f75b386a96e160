use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{ConvertError, ConvertResult};
use crate::SourceFramework;

/// How a model is stored on disk, inferred from the path.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// A PyTorch checkpoint or state dict: `.pt`, `.pth`, `.bin` or `.safetensors`.
    NativeCheckpoint,
    /// A TensorFlow SavedModel directory.
    SavedGraphDirectory,
    /// A single-file Keras model: `.h5` or `.keras`.
    KerasArchive,
    /// An ONNX file.
    Interchange,
}

/// A model file or directory together with its inferred format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ModelArtifact {
    path: PathBuf,
    format: ArtifactFormat,
}

impl ModelArtifact {
    /// Identify the format of an existing path.
    pub fn identify(path: impl AsRef<Path>) -> ConvertResult<ModelArtifact> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConvertError::NotFound(path.to_owned()));
        }

        let format = if path.is_dir() {
            ArtifactFormat::SavedGraphDirectory
        } else {
            ArtifactFormat::from_extension(path).ok_or_else(|| ConvertError::UnknownFormat(path.to_owned()))?
        };

        Ok(ModelArtifact {
            path: path.to_owned(),
            format,
        })
    }

    pub(crate) fn new(path: PathBuf, format: ArtifactFormat) -> ModelArtifact {
        ModelArtifact { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Fail with [ConvertError::FormatMismatch] unless this artifact has the given format.
    pub fn expect_format(&self, expected: ArtifactFormat) -> ConvertResult<()> {
        if self.format == expected {
            Ok(())
        } else {
            Err(ConvertError::FormatMismatch {
                path: self.path.clone(),
                expected,
                actual: self.format,
            })
        }
    }
}

impl ArtifactFormat {
    pub fn from_extension(path: &Path) -> Option<ArtifactFormat> {
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        let format = match ext.as_str() {
            "onnx" => ArtifactFormat::Interchange,
            "pt" | "pth" | "bin" | "safetensors" => ArtifactFormat::NativeCheckpoint,
            "h5" | "keras" => ArtifactFormat::KerasArchive,
            _ => return None,
        };
        Some(format)
    }

    /// The framework whose converter reads this format, if any.
    pub fn framework(self) -> Option<SourceFramework> {
        match self {
            ArtifactFormat::NativeCheckpoint => Some(SourceFramework::PyTorch),
            ArtifactFormat::SavedGraphDirectory | ArtifactFormat::KerasArchive => Some(SourceFramework::TensorFlow),
            ArtifactFormat::Interchange => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ArtifactFormat::NativeCheckpoint => "native checkpoint",
            ArtifactFormat::SavedGraphDirectory => "saved model directory",
            ArtifactFormat::KerasArchive => "keras archive",
            ArtifactFormat::Interchange => "onnx",
        }
    }
}

impl Display for ArtifactFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
