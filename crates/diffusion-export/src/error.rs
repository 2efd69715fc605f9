use std::path::PathBuf;

/// Errors raised by the conversion driver.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// IO error while copying or cleaning directories.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the graph library.
    #[error(transparent)]
    Graph(#[from] onnx_graph::Error),

    /// Malformed footprint record.
    #[error("malformed footprint record: {0}")]
    Json(#[from] serde_json::Error),

    /// The optimizer left no footprint file for a submodel.
    #[error("missing optimization footprints for '{submodel}' (expected {path})")]
    MissingFootprints {
        /// Submodel being resolved.
        submodel: String,
        /// The footprint file that should exist.
        path: PathBuf,
    },

    /// The footprint file holds no record from a recognized optimizer pass.
    #[error("no optimizer footprint recognized for '{submodel}' in {path}")]
    NoOptimizerFootprint {
        /// Submodel being resolved.
        submodel: String,
        /// The footprint file that was scanned.
        path: PathBuf,
    },

    /// A requested module is not part of the selected family.
    #[error("unknown module '{module}' for family '{family}'")]
    UnknownModule {
        /// Requested module name.
        module: String,
        /// Selected family.
        family: String,
    },

    /// A directory-copy module has no source directory.
    #[error("source directory for module '{module}' missing at {path}")]
    MissingSource {
        /// Module being copied.
        module: String,
        /// Expected source directory.
        path: PathBuf,
    },
}
