//! Loading and writing of [ONNX](https://github.com/onnx/onnx) model files.

use std::path::Path;

use crate::graph::Graph;
use crate::onnx::load::graph_from_onnx_bytes;
use crate::onnx::result::{OnnxResult, ToOnnxLoadResult};

pub use export::{ir_version_for_opset, GraphBuilder, NodeAttributes};
pub use external_data::{DenyExternalData, ExternalDataLoader, ExternalRange, ModelDirectory};

#[allow(warnings)]
pub mod proto;

mod export;
mod external_data;
mod inputs;
mod load;
pub mod result;
mod store;
mod typed_value;

/// Load an onnx graph from a file.
///
/// If `allow_external` is set, tensor data may live in files in the directory of the model file.
pub fn load_graph_from_onnx_path(path: impl AsRef<Path>, allow_external: bool) -> OnnxResult<Graph> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).to_onnx_result(path)?;

    if allow_external {
        graph_from_onnx_bytes(&bytes, &mut ModelDirectory::of_model(path)?)
    } else {
        graph_from_onnx_bytes(&bytes, &mut DenyExternalData)
    }
}

/// Load an onnx graph from memory, external tensor data is rejected.
pub fn load_graph_from_onnx_bytes(buffer: &[u8]) -> OnnxResult<Graph> {
    graph_from_onnx_bytes(buffer, &mut DenyExternalData)
}

/// Load an onnx graph from memory, resolving external tensor data through `external`.
pub fn load_graph_with_external_data(buffer: &[u8], external: &mut dyn ExternalDataLoader) -> OnnxResult<Graph> {
    graph_from_onnx_bytes(buffer, external)
}
