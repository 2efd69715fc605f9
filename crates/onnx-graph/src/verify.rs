//! Model validation: serialization-schema and operator-set gates.

use crate::error::Error;
use crate::protos::{ModelProto, OperatorSetIdProto};

/// Minimum required version for the standard ONNX operator set.
pub const MIN_OPSET_VERSION: i64 = 14;

/// Highest IR version the vendored schema tracks.
pub const MAX_IR_VERSION: i64 = 10;

/// Gate a freshly loaded model: IR version within the schema we carry,
/// operator sets new enough for the rewrites.
pub fn verify_model(model: &ModelProto) -> Result<(), Error> {
    if model.ir_version > MAX_IR_VERSION {
        return Err(Error::UnsupportedIrVersion {
            found: model.ir_version,
            max: MAX_IR_VERSION,
        });
    }
    verify_opsets(&model.opset_import, MIN_OPSET_VERSION)
}

/// Check whether one operator set entry is supported.
pub fn check_opset_version(opset: &OperatorSetIdProto, min_version: i64) -> Result<(), Error> {
    match opset.domain.as_str() {
        // Standard ONNX operators
        "" | "ai.onnx" => {
            if opset.version < min_version {
                return Err(Error::UnsupportedOpset {
                    domain: opset.domain.clone(),
                    version: opset.version,
                    min: min_version,
                });
            }
            Ok(())
        }
        // ONNX ML operators are stable from version 1
        "ai.onnx.ml" => Ok(()),
        // Contributed ops emitted by the transformer optimizer
        "com.microsoft" => Ok(()),
        other => Err(Error::UnsupportedDomain(other.to_string())),
    }
}

/// Verify every operator set referenced by a model.
pub fn verify_opsets(opsets: &[OperatorSetIdProto], min_version: i64) -> Result<(), Error> {
    for opset in opsets {
        check_opset_version(opset, min_version)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opset(domain: &str, version: i64) -> OperatorSetIdProto {
        let mut opset = OperatorSetIdProto::new();
        opset.domain = domain.to_string();
        opset.version = version;
        opset
    }

    #[test]
    fn current_model_passes() {
        let mut model = ModelProto::new();
        model.ir_version = 8;
        model.opset_import.push(opset("", 17));
        model.opset_import.push(opset("com.microsoft", 1));
        verify_model(&model).unwrap();
    }

    #[test]
    fn old_opset_is_rejected() {
        let err = check_opset_version(&opset("", 9), MIN_OPSET_VERSION).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOpset { version: 9, .. }));
    }

    #[test]
    fn future_ir_version_is_rejected() {
        let mut model = ModelProto::new();
        model.ir_version = MAX_IR_VERSION + 1;
        assert!(matches!(
            verify_model(&model),
            Err(Error::UnsupportedIrVersion { .. })
        ));
    }

    #[test]
    fn unknown_domain_is_rejected() {
        assert!(matches!(
            check_opset_version(&opset("com.example", 1), MIN_OPSET_VERSION),
            Err(Error::UnsupportedDomain(_))
        ));
    }
}
