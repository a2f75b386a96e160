use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use crate::onnx::result::{OnnxError, OnnxResult, ToOnnxLoadResult};

/// A byte range of a tensor stored outside of the model file,
/// see [external data](https://github.com/onnx/onnx/blob/main/docs/ExternalData.md).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExternalRange {
    pub location: PathBuf,
    pub offset: u64,
    pub length: usize,
}

/// Source of external tensor data.
pub trait ExternalDataLoader {
    fn read(&mut self, range: &ExternalRange) -> OnnxResult<Vec<u8>>;
}

/// Fails on every external tensor, used when loading from bytes.
#[derive(Debug)]
pub struct DenyExternalData;

/// Resolves locations relative to the directory containing the model file.
#[derive(Debug)]
pub struct ModelDirectory {
    root: PathBuf,
}

impl ExternalDataLoader for DenyExternalData {
    fn read(&mut self, range: &ExternalRange) -> OnnxResult<Vec<u8>> {
        Err(OnnxError::ExternalDataNotAllowed(range.location.clone()))
    }
}

impl ModelDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ModelDirectory { root: root.into() }
    }

    /// The directory of the given model file.
    pub fn of_model(model: &Path) -> OnnxResult<Self> {
        let root = model
            .parent()
            .ok_or_else(|| OnnxError::MustHaveParentPath(model.to_owned()))?;
        Ok(Self::new(root))
    }
}

impl ExternalDataLoader for ModelDirectory {
    fn read(&mut self, range: &ExternalRange) -> OnnxResult<Vec<u8>> {
        // only plain relative paths, no escaping the model directory
        if !range.location.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(OnnxError::NonNormalExternalDataPath(range.location.clone()));
        }

        let path = self.root.join(&range.location);
        let mut file = File::open(&path).to_onnx_result(&path)?;

        // the file size bounds the allocation, whatever the model claims
        let file_len = file.metadata().to_onnx_result(&path)?.len();
        let fits = range
            .offset
            .checked_add(range.length as u64)
            .map_or(false, |end| end <= file_len);
        if !fits {
            let message = format!(
                "range {}+{} is outside of the {} byte file",
                range.offset, range.length, file_len
            );
            return Err(OnnxError::IO(path, io::Error::new(io::ErrorKind::UnexpectedEof, message)));
        }

        file.seek(SeekFrom::Start(range.offset)).to_onnx_result(&path)?;

        let mut buffer = vec![0; range.length];
        file.read_exact(&mut buffer).to_onnx_result(&path)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(location: &str, offset: u64, length: usize) -> ExternalRange {
        ExternalRange {
            location: PathBuf::from(location),
            offset,
            length,
        }
    }

    #[test]
    fn rejects_escaping_paths() {
        let mut loader = ModelDirectory::new(".");
        let result = loader.read(&range("../weights.bin", 0, 4));
        assert!(matches!(result, Err(OnnxError::NonNormalExternalDataPath(_))));
    }

    #[test]
    fn reads_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("weights.bin"), [0u8, 1, 2, 3, 4, 5, 6, 7]).unwrap();

        let mut loader = ModelDirectory::of_model(&dir.path().join("model.onnx")).unwrap();
        assert_eq!(loader.read(&range("weights.bin", 2, 4)).unwrap(), vec![2, 3, 4, 5]);

        // past the end of the file
        assert!(matches!(
            loader.read(&range("weights.bin", 6, 4)),
            Err(OnnxError::IO(_, _))
        ));
        assert!(matches!(
            loader.read(&range("weights.bin", u64::MAX, 1)),
            Err(OnnxError::IO(_, _))
        ));
        assert!(matches!(
            loader.read(&range("weights.bin", 0, usize::MAX)),
            Err(OnnxError::IO(_, _))
        ));
    }

    #[test]
    fn denied() {
        let result = DenyExternalData.read(&range("weights.bin", 0, 4));
        assert!(matches!(result, Err(OnnxError::ExternalDataNotAllowed(_))));
    }
}
