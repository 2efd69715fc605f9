//! Optimization footprint records.
//!
//! The external optimizer records every pass run over a submodel in a
//! `footprints.json` file under `{cache}/models/{submodel}/`. The driver
//! picks the artifact of the last recognized optimizer pass, in file
//! order.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Passes whose output is a finished, optimized model.
pub const OPTIMIZER_PASSES: [&str; 4] = [
    "OnnxConversion",
    "OnnxFloatToFloat16",
    "OnnxPeepholeOptimizer",
    "OrtTransformersOptimization",
];

#[derive(Debug, Deserialize)]
struct Footprint {
    from_pass: String,
    model_config: ModelConfig,
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    config: ModelFileConfig,
}

#[derive(Debug, Deserialize)]
struct ModelFileConfig {
    model_path: PathBuf,
}

/// Resolve the optimized model file for `submodel` through the cache's
/// footprint records. A missing footprint file or a file without any
/// recognized optimizer record is fatal.
pub fn resolve_optimized_model(cache_dir: &Path, submodel: &str) -> Result<PathBuf, Error> {
    let path = cache_dir
        .join("models")
        .join(submodel)
        .join("footprints.json");
    let raw = fs::read_to_string(&path).map_err(|_| Error::MissingFootprints {
        submodel: submodel.to_string(),
        path: path.clone(),
    })?;
    select_model_path(&raw, &path)?.ok_or_else(|| Error::NoOptimizerFootprint {
        submodel: submodel.to_string(),
        path: path.clone(),
    })
}

/// Scan the records in file order and keep the last one produced by a
/// recognized optimizer pass. Relative artifact paths are resolved against
/// the footprint file's directory.
fn select_model_path(raw: &str, footprints_path: &Path) -> Result<Option<PathBuf>, Error> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;

    let mut selected = None;
    for value in map.values() {
        let Ok(footprint) = serde_json::from_value::<Footprint>(value.clone()) else {
            continue;
        };
        if OPTIMIZER_PASSES.contains(&footprint.from_pass.as_str()) {
            selected = Some(footprint.model_config.config.model_path);
        }
    }

    Ok(selected.map(|model_path| {
        if model_path.is_relative() {
            let base = footprints_path.parent().unwrap_or_else(|| Path::new("."));
            base.join(model_path)
        } else {
            model_path
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOOTPRINTS: &str = r#"{
        "run_0": {
            "from_pass": "OnnxConversion",
            "model_config": { "type": "ONNXModel", "config": { "model_path": "conv/model.onnx" } }
        },
        "run_1": {
            "from_pass": "OrtTransformersOptimization",
            "model_config": { "type": "ONNXModel", "config": { "model_path": "opt/model.onnx" } }
        },
        "run_2": {
            "from_pass": "SomeUnrelatedPass",
            "model_config": { "type": "ONNXModel", "config": { "model_path": "other/model.onnx" } }
        }
    }"#;

    #[test]
    fn last_recognized_pass_wins() {
        let path = Path::new("/cache/models/unet/footprints.json");
        let resolved = select_model_path(FOOTPRINTS, path).unwrap().unwrap();
        assert_eq!(resolved, Path::new("/cache/models/unet/opt/model.onnx"));
    }

    #[test]
    fn absolute_artifact_paths_pass_through() {
        let raw = r#"{
            "run": {
                "from_pass": "OnnxFloatToFloat16",
                "model_config": { "config": { "model_path": "/tmp/opt/model.onnx" } }
            }
        }"#;
        let resolved = select_model_path(raw, Path::new("footprints.json"))
            .unwrap()
            .unwrap();
        assert_eq!(resolved, Path::new("/tmp/opt/model.onnx"));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = select_model_path("not json", Path::new("footprints.json")).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn unrecognized_passes_only_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("models").join("unet");
        fs::create_dir_all(&sub).unwrap();
        fs::write(
            sub.join("footprints.json"),
            r#"{"run": {"from_pass": "Nope", "model_config": {"config": {"model_path": "m"}}}}"#,
        )
        .unwrap();

        let err = resolve_optimized_model(dir.path(), "unet").unwrap_err();
        assert!(matches!(err, Error::NoOptimizerFootprint { .. }));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_optimized_model(dir.path(), "unet").unwrap_err();
        assert!(matches!(err, Error::MissingFootprints { .. }));
    }
}
