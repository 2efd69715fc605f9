#![warn(missing_docs)]

//! `onnx-graph` round-trips serialized ONNX models and performs the graph
//! surgery needed after automatic export: precision-cast boundary
//! normalization, targeted precision patches for positional-embedding
//! subgraphs, and externalization of large tensor payloads.
//!
//! Models are manipulated at the protobuf level so that nodes, attributes
//! and initializers that a rewrite does not touch survive byte-for-byte.

/// Generated ONNX protobuf messages.
pub mod protos;

pub mod editor;
pub mod rewrite;
pub mod signature;
pub mod verify;

mod error;
mod ir;
mod read;
mod write;

pub use error::Error;
pub use ir::{ElementType, NodeType};
pub use read::load_model;
pub use rewrite::iocast::{normalize_io, normalize_model_io, Boundary, BoundaryCast};
pub use rewrite::precision::{apply_precision_rule, PrecisionPatch, PrecisionRule};
pub use signature::{validate_signature, Dim, TensorSpec};
pub use verify::{verify_model, MAX_IR_VERSION, MIN_OPSET_VERSION};
pub use write::{save_model, SaveOptions};
