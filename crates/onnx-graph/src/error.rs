use std::path::PathBuf;

/// Errors raised while reading, rewriting or writing a model.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// IO error while reading or writing model files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed protobuf payload.
    #[error("protobuf error: {0}")]
    Proto(#[from] protobuf::Error),

    /// Element type code not part of the supported enumeration.
    #[error("unknown element type code {0}")]
    UnknownElementType(i32),

    /// Model IR version is newer than the serialization schema we carry.
    #[error("unsupported IR version {found} (max supported {max})")]
    UnsupportedIrVersion {
        /// Version found in the model.
        found: i64,
        /// Highest supported version.
        max: i64,
    },

    /// Standard-domain opset is older than the rewrites assume.
    #[error("unsupported opset {version} for domain '{domain}' (min supported {min})")]
    UnsupportedOpset {
        /// Opset domain, empty for the standard domain.
        domain: String,
        /// Version found in the model.
        version: i64,
        /// Lowest supported version.
        min: i64,
    },

    /// Operator domain we know nothing about.
    #[error("unsupported opset domain '{0}'")]
    UnsupportedDomain(String),

    /// External tensor data could not be resolved.
    #[error("external data for tensor '{tensor}': {reason}")]
    ExternalData {
        /// Name of the initializer.
        tensor: String,
        /// What went wrong.
        reason: String,
    },

    /// Output path has no usable file name for the external data sibling.
    #[error("model path '{0}' has no file name")]
    InvalidModelPath(PathBuf),

    /// A precision rule's scope anchor matched no node in the graph.
    #[error("precision rule matched no '{op}' node under scope '{scope}'")]
    ScopeMatchedNothing {
        /// Name-prefix anchor of the rule.
        scope: String,
        /// Op type the rule widens.
        op: String,
    },

    /// Declared graph boundary does not match the expected signature.
    #[error("signature mismatch at {boundary}: {reason}")]
    SignatureMismatch {
        /// Which boundary failed, e.g. `input[2] 'timestep'`.
        boundary: String,
        /// What differed.
        reason: String,
    },
}
