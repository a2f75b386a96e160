#![warn(missing_debug_implementations)]
#![allow(clippy::new_without_default)]

//! Model graph representation used throughout edgekit, with ONNX loading and writing.
//!
//! The core type of this crate is [Graph](graph::Graph), built by loading an ONNX file:
//! ```no_run
//! # use ek_graph::onnx::load_graph_from_onnx_path;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = load_graph_from_onnx_path("model.onnx", true)?;
//! for input in graph.inputs() {
//!     println!("{}", input);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! New models are written with [GraphBuilder](onnx::GraphBuilder).

/// The [ndarray] crate is used for constant storage and CPU execution, and re-exported for convenience.
pub use ndarray;

pub mod dtype;
pub mod graph;
pub mod onnx;
pub mod shape;
