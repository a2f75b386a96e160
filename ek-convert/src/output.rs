use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ConvertError, ConvertResult};

/// An output file that only appears at its final path once [PendingOutput::persist] is called.
///
/// The data is written to a temporary file in the destination directory,
/// which is removed again if this value is dropped without persisting.
#[derive(Debug)]
pub struct PendingOutput {
    file: NamedTempFile,
    target: PathBuf,
}

impl PendingOutput {
    pub fn new(target: &Path) -> ConvertResult<PendingOutput> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
            _ => PathBuf::from("."),
        };

        std::fs::create_dir_all(&dir)
            .map_err(|e| ConvertError::failure(format!("cannot create output directory '{}': {}", dir.display(), e)))?;

        let file = tempfile::Builder::new()
            .prefix(".edgekit-")
            .suffix(".onnx.partial")
            .tempfile_in(&dir)
            .map_err(|e| ConvertError::failure(format!("cannot create a file in '{}': {}", dir.display(), e)))?;

        debug!("Writing to temporary file {}", file.path().display());
        Ok(PendingOutput {
            file,
            target: target.to_owned(),
        })
    }

    /// Where external tools should write their output.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> ConvertResult<()> {
        self.file
            .write_all(bytes)
            .and_then(|()| self.file.flush())
            .map_err(|e| ConvertError::failure(format!("cannot write output: {}", e)))
    }

    /// Move the finished file to its target path. Fails if nothing was written.
    pub fn persist(self) -> ConvertResult<PathBuf> {
        let len = std::fs::metadata(self.file.path()).map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            return Err(ConvertError::failure("the converter did not produce any output"));
        }

        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|e| ConvertError::failure(format!("cannot move output to '{}': {}", target.display(), e.error)))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("model.onnx");

        let mut output = PendingOutput::new(&target).unwrap();
        output.write_all(b"onnx bytes").unwrap();
        let path = output.persist().unwrap();

        assert_eq!(path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"onnx bytes");
        assert_eq!(std::fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn dropped_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("model.onnx");

        let mut output = PendingOutput::new(&target).unwrap();
        output.write_all(b"half a model").unwrap();
        drop(output);

        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn empty_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("model.onnx");

        let output = PendingOutput::new(&target).unwrap();
        assert!(matches!(output.persist(), Err(ConvertError::ConversionFailure(_))));
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
