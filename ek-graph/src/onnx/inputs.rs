use std::collections::HashMap;

use itertools::Itertools;

use crate::onnx::proto::attribute_proto::AttributeType;
use crate::onnx::proto::{AttributeProto, TensorProto};
use crate::onnx::result::{Node, OnnxError, OnnxResult, UnwrapProto};
use crate::onnx::store::Store;
use crate::onnx::typed_value::TypedValue;

#[derive(Debug)]
pub struct Inputs<'a> {
    node: Node<&'a str>,
    inner: Vec<Storage<(&'a str, &'a TypedValue)>>,
}

#[derive(Debug)]
enum Storage<T> {
    Missing,
    Used,
    Present(T),
}

impl<'a> Inputs<'a> {
    pub fn from(node: Node<&'a str>, inputs: &'a [String], nodes: &'a Store<TypedValue>) -> OnnxResult<Self> {
        let inner: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(i, name)| {
                // an empty input name means the input is missing (which is only allowed for optional inputs)
                if name.is_empty() {
                    Ok(Storage::Missing)
                } else {
                    match nodes.get(name) {
                        Some(value) => Ok(Storage::Present((name.as_str(), value))),
                        None => Err(OnnxError::InputNodeDoesNotExist(node.to_owned(), i, name.clone())),
                    }
                }
            })
            .try_collect()?;

        Ok(Inputs { node, inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn required(&mut self, index: usize) -> OnnxResult<(&'a str, &'a TypedValue)> {
        self.optional(index)?
            .ok_or_else(|| OnnxError::MissingInput(self.node.to_owned(), index, self.inner.len()))
    }

    pub fn optional(&mut self, index: usize) -> OnnxResult<Option<(&'a str, &'a TypedValue)>> {
        match self.take(index) {
            Storage::Present(value) => Ok(Some(value)),
            Storage::Missing => Ok(None),
            Storage::Used => Err(OnnxError::InvalidOperationArgs(
                self.node.to_owned(),
                format!("input {} used twice", index),
            )),
        }
    }

    /// Take the given input, which must be an integer constant.
    pub fn required_int_const(&mut self, index: usize) -> OnnxResult<Vec<i64>> {
        let (name, value) = self.required(index)?;
        value
            .as_int_const()
            .map(|data| data.to_vec())
            .ok_or_else(|| OnnxError::ExpectedConstant(self.node.to_owned(), index, name.to_owned()))
    }

    pub fn leftover(&self) -> Vec<usize> {
        self.inner
            .iter()
            .positions(|x| matches!(x, Storage::Present(_)))
            .collect()
    }

    fn take(&mut self, index: usize) -> Storage<(&'a str, &'a TypedValue)> {
        match self.inner.get(index) {
            None => Storage::Missing,
            Some(Storage::Missing) => Storage::Missing,
            Some(Storage::Used) => Storage::Used,
            Some(&Storage::Present(value)) => {
                self.inner[index] = Storage::Used;
                Storage::Present(value)
            }
        }
    }
}

#[derive(Debug)]
pub struct Attributes<'a> {
    node: Node<&'a str>,
    inner: HashMap<&'a str, &'a AttributeProto>,
}

impl<'a> Attributes<'a> {
    pub fn from(node: Node<&'a str>, attrs: &'a [AttributeProto]) -> Self {
        let inner: HashMap<&str, &AttributeProto> = attrs.iter().map(|a| (&*a.name, a)).collect();
        Attributes { node, inner }
    }

    pub fn maybe_take(&mut self, key: &str, ty: AttributeType) -> OnnxResult<Option<&'a AttributeProto>> {
        match self.inner.remove(key) {
            None => Ok(None),
            Some(attribute) => {
                let actual = AttributeType::try_from(attribute.r#type)
                    .map_err(|_| OnnxError::InvalidEnumValue("attribute.type", attribute.r#type))?;
                if actual != ty {
                    return Err(OnnxError::UnexpectedAttributeType(
                        self.node.to_owned(),
                        key.to_owned(),
                        ty,
                        actual,
                    ));
                }
                Ok(Some(attribute))
            }
        }
    }

    pub fn take(&mut self, key: &str, ty: AttributeType) -> OnnxResult<&'a AttributeProto> {
        match self.maybe_take(key, ty)? {
            Some(attribute) => Ok(attribute),
            None => {
                let available = self.inner.keys().map(|&s| s.to_owned()).collect_vec();
                Err(OnnxError::MissingAttribute(
                    self.node.to_owned(),
                    key.to_owned(),
                    ty,
                    available,
                ))
            }
        }
    }

    pub fn maybe_take_int(&mut self, key: &str) -> OnnxResult<Option<i64>> {
        Ok(self.maybe_take(key, AttributeType::Int)?.map(|a| a.i))
    }

    pub fn maybe_take_ints(&mut self, key: &str) -> OnnxResult<Option<&'a [i64]>> {
        Ok(self.maybe_take(key, AttributeType::Ints)?.map(|a| &*a.ints))
    }

    pub fn maybe_take_float(&mut self, key: &str) -> OnnxResult<Option<f32>> {
        Ok(self.maybe_take(key, AttributeType::Float)?.map(|a| a.f))
    }

    pub fn maybe_take_bool(&mut self, key: &str) -> OnnxResult<Option<bool>> {
        match self.maybe_take_int(key)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(other) => Err(OnnxError::InvalidAttributeBool(self.node.to_owned(), key.to_owned(), other)),
        }
    }

    pub fn take_tensor(&mut self, key: &str) -> OnnxResult<&'a TensorProto> {
        self.take(key, AttributeType::Tensor)?.t.as_ref().unwrap_proto("attribute.t")
    }

    /// Drop an attribute that has no effect during inference.
    pub fn ignore(&mut self, key: &str) {
        self.inner.remove(key);
    }

    pub fn leftover(&self) -> Vec<String> {
        self.inner.keys().map(|&s| s.to_owned()).sorted().collect()
    }
}
