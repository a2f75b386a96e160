use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use itertools::Itertools;
use tracing::debug;

use crate::error::{ConvertError, ConvertResult};
use crate::SourceFramework;

/// A Python interpreter used to drive the framework exporters.
#[derive(Debug, Clone)]
pub struct Python {
    interpreter: PathBuf,
}

impl Python {
    pub fn new(interpreter: impl Into<PathBuf>) -> Python {
        Python {
            interpreter: interpreter.into(),
        }
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Check that all `modules` can be imported, otherwise report the framework as missing.
    pub fn probe(&self, framework: SourceFramework, modules: &[&str], hint: &str) -> ConvertResult<()> {
        let script = format!("import {}", modules.iter().join(", "));
        let missing = |reason: String| ConvertError::MissingDependency {
            framework,
            hint: format!("{} ({})", hint, reason),
        };

        let output = self
            .command()
            .arg("-c")
            .arg(&script)
            .output()
            .map_err(|e| missing(format!("cannot run '{}': {}", self.interpreter.display(), e)))?;

        if output.status.success() {
            debug!("Python modules {:?} are available", modules);
            Ok(())
        } else {
            Err(missing(last_line(&output).unwrap_or_else(|| "import failed".to_owned())))
        }
    }

    /// Run an inline script with the given arguments, any failure is a [ConvertError::ConversionFailure].
    pub fn run_script(&self, script: &str, args: &[OsString]) -> ConvertResult<()> {
        let mut command = self.command();
        command.arg("-c").arg(script).args(args);
        self.run(command)
    }

    /// Run `python -m module args...`.
    pub fn run_module(&self, module: &str, args: &[OsString]) -> ConvertResult<()> {
        let mut command = self.command();
        command.arg("-m").arg(module).args(args);
        self.run(command)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.interpreter);
        // keep framework logging quiet, errors still end up on stderr
        command.env("TF_CPP_MIN_LOG_LEVEL", "3");
        command
    }

    fn run(&self, mut command: Command) -> ConvertResult<()> {
        debug!("Running {:?}", command);

        let output = command
            .output()
            .map_err(|e| ConvertError::failure(format!("cannot run '{}': {}", self.interpreter.display(), e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let reason = last_line(&output).unwrap_or_else(|| format!("exited with {}", output.status));
            Err(ConvertError::failure(reason))
        }
    }
}

/// The last non-empty line of stderr, which for a Python traceback is the exception itself.
fn last_line(output: &Output) -> Option<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_owned)
}
