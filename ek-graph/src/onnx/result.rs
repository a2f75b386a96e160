use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

use crate::onnx::proto::attribute_proto::AttributeType;

pub type OnnxResult<T> = Result<T, OnnxError>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Node<S = String> {
    pub name: S,
    pub op_type: S,
}

#[derive(Debug)]
pub enum OnnxError {
    IO(PathBuf, io::Error),
    Decode(prost::DecodeError),

    NonNormalExternalDataPath(PathBuf),
    MustHaveParentPath(PathBuf),
    ExternalDataNotAllowed(PathBuf),
    InvalidExternalData(String, String),

    MissingProtoField(&'static str),
    InvalidEnumValue(&'static str, i32),
    DuplicateValue(String),

    LeftoverInputs(Node, Vec<usize>),
    LeftoverAttributes(Node, Vec<String>),

    InputNodeDoesNotExist(Node, usize, String),
    MissingInput(Node, usize, usize),
    MissingAttribute(Node, String, AttributeType, Vec<String>),
    UnexpectedAttributeType(Node, String, AttributeType, AttributeType),
    InvalidAttributeBool(Node, String, i64),
    InvalidOperationArgs(Node, String),
    ExpectedConstant(Node, usize, String),

    UnsupportedOperation(Node),
    UnsupportedDomain(Node, String),
    UnsupportedMultipleOutputs(Node, Vec<String>),
    UnsupportedType(String, i32),
    UnsupportedValueKind(String),

    NegativeDimension(String, i64),
    DataLengthMismatch(String, usize, usize),
    TensorTooLarge(String, Vec<usize>),
    UndefinedOutput(String),
}

impl OnnxError {
    /// Whether this error means the bytes are not a well-formed model at all,
    /// as opposed to a valid model using features that are not supported.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            OnnxError::Decode(_)
                | OnnxError::MissingProtoField(_)
                | OnnxError::InvalidEnumValue(_, _)
                | OnnxError::DuplicateValue(_)
                | OnnxError::InputNodeDoesNotExist(_, _, _)
                | OnnxError::NegativeDimension(_, _)
                | OnnxError::DataLengthMismatch(_, _, _)
                | OnnxError::TensorTooLarge(_, _)
                | OnnxError::UndefinedOutput(_)
        )
    }
}

impl From<prost::DecodeError> for OnnxError {
    fn from(e: prost::DecodeError) -> Self {
        OnnxError::Decode(e)
    }
}

pub trait ToOnnxLoadResult {
    type T;
    fn to_onnx_result(self, path: impl AsRef<Path>) -> OnnxResult<Self::T>;
}

impl<T> ToOnnxLoadResult for Result<T, io::Error> {
    type T = T;
    fn to_onnx_result(self, path: impl AsRef<Path>) -> OnnxResult<T> {
        self.map_err(|e| OnnxError::IO(path.as_ref().to_owned(), e))
    }
}

pub trait UnwrapProto {
    type T;
    fn unwrap_proto(self, field: &'static str) -> OnnxResult<Self::T>;
}

impl<T> UnwrapProto for Option<T> {
    type T = T;
    fn unwrap_proto(self, field: &'static str) -> OnnxResult<T> {
        self.ok_or(OnnxError::MissingProtoField(field))
    }
}

impl<S: AsRef<str>> Node<S> {
    pub fn to_owned(&self) -> Node<String> {
        Node {
            name: self.name.as_ref().to_owned(),
            op_type: self.op_type.as_ref().to_owned(),
        }
    }
}

impl Display for OnnxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OnnxError::IO(path, e) => write!(f, "failed to read '{}': {}", path.display(), e),
            OnnxError::Decode(e) => write!(f, "not a valid ONNX protobuf: {}", e),
            OnnxError::ExternalDataNotAllowed(location) => {
                write!(f, "tensor data in external file '{}' is not allowed here", location.display())
            }
            OnnxError::UnsupportedOperation(node) => {
                write!(f, "unsupported operation '{}' in node '{}'", node.op_type, node.name)
            }
            OnnxError::UnsupportedType(name, data_type) => {
                write!(f, "tensor '{}' has unsupported element type {}", name, data_type)
            }
            OnnxError::DataLengthMismatch(name, expected, actual) => {
                write!(f, "tensor '{}' should have {} bytes of data, got {}", name, expected, actual)
            }
            OnnxError::TensorTooLarge(name, dims) => write!(f, "tensor '{}' with shape {:?} is too large", name, dims),
            OnnxError::UndefinedOutput(name) => write!(f, "graph output '{}' is never computed", name),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl Error for OnnxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OnnxError::IO(_, e) => Some(e),
            OnnxError::Decode(e) => Some(e),
            _ => None,
        }
    }
}
