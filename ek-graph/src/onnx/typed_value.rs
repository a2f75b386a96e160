use crate::dtype::Tensor;

/// A value as it appears while loading the onnx graph.
///
/// Integer constants are only ever used as compile-time arguments (shapes, axes),
/// so they are kept separately and never become part of the runtime graph.
#[derive(Debug, Clone)]
pub enum TypedValue {
    /// A graph input or node output, only known at runtime.
    Runtime,
    FloatConst(Tensor),
    IntConst { dims: Vec<usize>, data: Vec<i64> },
}

impl TypedValue {
    pub fn as_int_const(&self) -> Option<&[i64]> {
        match self {
            TypedValue::IntConst { data, .. } => Some(data),
            _ => None,
        }
    }
}
