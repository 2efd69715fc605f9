#![warn(missing_docs)]

//! `diffusion-export` packages the output of an external ONNX export and
//! optimization toolchain into a runnable diffusion pipeline directory.
//!
//! Each supported model family declares its submodels: tokenizer
//! directories that are copied verbatim, and exported graphs that are
//! located through the optimizer's footprint records, checked against the
//! family's declared invocation contract, patched (boundary casts,
//! positional-embedding precision) and written to the final layout.

pub mod config;
pub mod footprint;
pub mod logger;
pub mod pipeline;
pub mod registry;

mod error;

pub use error::Error;
