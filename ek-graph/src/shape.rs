use std::fmt::{Debug, Display, Formatter};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Build a [Shape] from a list of anything that converts into a [Size].
///
/// ```
/// # use ek_graph::shape;
/// # use ek_graph::shape::Size;
/// let s = shape![Size::dynamic("batch_size"), 10];
/// assert_eq!(s.to_string(), "[batch_size, 10]");
/// ```
#[macro_export]
macro_rules! shape {
    [$($value:expr),* $(,)?] => {
        $crate::shape::Shape::new(vec![$($crate::shape::Size::from($value)),*])
    };
}

/// A declared tensor shape, where some dimensions may be left dynamic.
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape {
    pub dims: Vec<Size>,
}

/// A single dimension of a [Shape].
///
/// Dynamic dimensions keep the symbolic name from the model file if there was one (typically `batch_size`).
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size {
    Fixed(usize),
    Dynamic(Option<String>),
}

impl Shape {
    pub fn new(dims: Vec<Size>) -> Shape {
        Shape { dims }
    }

    pub fn fixed(dims: &[usize]) -> Shape {
        Shape::new(dims.iter().map(|&d| Size::Fixed(d)).collect_vec())
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_fixed(&self) -> bool {
        self.dims.iter().all(|d| d.as_fixed().is_some())
    }

    pub fn as_fixed(&self) -> Option<Vec<usize>> {
        self.dims.iter().map(|d| d.as_fixed()).collect()
    }

    /// Materialize this shape, replacing every dynamic dimension with `dynamic_size`.
    pub fn concretize(&self, dynamic_size: usize) -> Vec<usize> {
        self.dims
            .iter()
            .map(|d| d.as_fixed().unwrap_or(dynamic_size))
            .collect_vec()
    }

    /// Whether the concrete `dims` could be fed into a value declared with this shape.
    pub fn accepts(&self, dims: &[usize]) -> bool {
        self.rank() == dims.len()
            && self.dims.iter().zip(dims).all(|(d, &c)| match *d {
                Size::Fixed(f) => f == c,
                Size::Dynamic(_) => true,
            })
    }

    pub fn size(&self) -> Option<usize> {
        self.as_fixed().map(|dims| dims.iter().product())
    }
}

impl Size {
    pub fn fixed(size: usize) -> Size {
        Size::Fixed(size)
    }

    pub fn dynamic(name: impl Into<String>) -> Size {
        Size::Dynamic(Some(name.into()))
    }

    pub fn unnamed() -> Size {
        Size::Dynamic(None)
    }

    pub fn as_fixed(&self) -> Option<usize> {
        match *self {
            Size::Fixed(size) => Some(size),
            Size::Dynamic(_) => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Size::Dynamic(_))
    }
}

impl From<usize> for Size {
    fn from(size: usize) -> Self {
        Size::Fixed(size)
    }
}

impl Debug for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shape({})", self)
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.dims.iter().join(", "))
    }
}

impl Debug for Size {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Size({})", self)
    }
}

impl Display for Size {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Size::Fixed(size) => write!(f, "{}", size),
            Size::Dynamic(Some(name)) => write!(f, "{}", name),
            Size::Dynamic(None) => write!(f, "?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concretize_dynamic() {
        let shape = shape![Size::dynamic("batch_size"), 3, Size::unnamed()];
        assert_eq!(shape.concretize(1), vec![1, 3, 1]);
        assert!(!shape.is_fixed());
        assert_eq!(shape.as_fixed(), None);
    }

    #[test]
    fn accepts() {
        let shape = shape![Size::dynamic("batch_size"), 10];
        assert!(shape.accepts(&[1, 10]));
        assert!(shape.accepts(&[32, 10]));
        assert!(!shape.accepts(&[1, 11]));
        assert!(!shape.accepts(&[10]));
    }

    #[test]
    fn display() {
        assert_eq!(shape![1, 10].to_string(), "[1, 10]");
        assert_eq!(shape![Size::unnamed(), 5].to_string(), "[?, 5]");
        assert_eq!(Shape::new(vec![]).to_string(), "[]");
    }

    #[test]
    fn serialize() {
        let shape = shape![Size::dynamic("batch_size"), 10, Size::unnamed()];
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(json, r#"["batch_size",10,null]"#);
    }
}
