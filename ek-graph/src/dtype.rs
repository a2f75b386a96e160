use std::fmt::{Display, Formatter};

use ndarray::{ArcArray, IxDyn};
use serde::{Serialize, Serializer};

/// We're using an ArcArray so reshaping and passing constants around is free.
pub type Tensor = ArcArray<f32, IxDyn>;

/// Element type of a tensor as declared in a model file.
///
/// Only [DType::F32] can be executed, the others are kept so introspection can report them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    I(DSize),
    U(DSize),
    Bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DSize {
    S8,
    S16,
    S32,
    S64,
}

impl DType {
    pub fn size(self) -> DSize {
        match self {
            DType::F16 | DType::BF16 => DSize::S16,
            DType::F32 => DSize::S32,
            DType::F64 => DSize::S64,
            DType::I(size) => size,
            DType::U(size) => size,
            DType::Bool => DSize::S8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    pub fn is_int(self) -> bool {
        matches!(self, DType::I(_) | DType::U(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::F16 => "float16",
            DType::BF16 => "bfloat16",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I(DSize::S8) => "int8",
            DType::I(DSize::S16) => "int16",
            DType::I(DSize::S32) => "int32",
            DType::I(DSize::S64) => "int64",
            DType::U(DSize::S8) => "uint8",
            DType::U(DSize::S16) => "uint16",
            DType::U(DSize::S32) => "uint32",
            DType::U(DSize::S64) => "uint64",
            DType::Bool => "bool",
        }
    }
}

impl DSize {
    pub fn bytes(self) -> usize {
        match self {
            DSize::S8 => 1,
            DSize::S16 => 2,
            DSize::S32 => 4,
            DSize::S64 => 8,
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for DType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(DType::F32.size().bytes(), 4);
        assert_eq!(DType::I(DSize::S64).size().bytes(), 8);
        assert_eq!(DType::BF16.size().bytes(), 2);
    }

    #[test]
    fn names() {
        assert_eq!(DType::F32.to_string(), "float32");
        assert_eq!(DType::U(DSize::S8).to_string(), "uint8");
        assert!(DType::F16.is_float());
        assert!(!DType::Bool.is_int());
    }
}
