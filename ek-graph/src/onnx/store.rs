use std::collections::HashMap;

use crate::onnx::result::{OnnxError, OnnxResult};

/// Values defined so far while walking a graph, by name.
#[derive(Debug)]
pub struct Store<T> {
    inner: HashMap<String, T>,
}

impl<T> Store<T> {
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn define(&mut self, key: &str, value: T) -> OnnxResult<()> {
        let prev = self.inner.insert(key.to_owned(), value);
        match prev {
            None => Ok(()),
            Some(_) => Err(OnnxError::DuplicateValue(key.to_owned())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.inner.get(key)
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Store {
            inner: Default::default(),
        }
    }
}
