//! The conversion driver.
//!
//! Resolves each requested submodel, patches exported graphs and lays out
//! the final model directory. Everything runs synchronously; the first
//! failure aborts the invocation.

use std::fs;
use std::path::{Path, PathBuf};

use onnx_graph::rewrite::iocast::normalize_model_io;
use onnx_graph::rewrite::precision::apply_precision_rule;
use onnx_graph::{load_model, save_model, validate_signature, verify_model, SaveOptions};

use crate::error::Error;
use crate::footprint::resolve_optimized_model;
use crate::registry::{ModelFamily, Submodel, SubmodelPlan};

/// Name of the graph definition file inside each submodel directory.
const MODEL_FILE: &str = "model.onnx";

/// Directory the optimizer cache is expected in when not overridden.
const CACHE_DIR: &str = ".export-cache";

/// One `convert` invocation.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// Model family to package.
    pub family: ModelFamily,
    /// Source pipeline directory (tokenizers and configs).
    pub input: PathBuf,
    /// Output directory, `{input}/_onnx` when absent.
    pub output: Option<PathBuf>,
    /// Modules to convert, the family default when absent.
    pub modules: Option<Vec<String>>,
    /// Optimizer cache directory, `{input}/.export-cache` when absent.
    pub cache_dir: Option<PathBuf>,
    /// Delete the optimizer cache after packaging.
    pub clean: bool,
    /// Externalize large tensor payloads next to each graph file.
    pub external_data: bool,
}

/// One packaged submodel.
#[derive(Debug, Clone)]
pub struct ConvertedModule {
    /// Module name.
    pub name: String,
    /// Directory the module was written to.
    pub path: PathBuf,
}

/// Package every requested module of the request's family.
///
/// Returns the converted modules in conversion order.
pub fn convert(request: &ConvertRequest) -> Result<Vec<ConvertedModule>, Error> {
    let config = request.family.shape_config();
    let submodels = match &request.modules {
        None => request.family.submodels(&config),
        Some(names) => names
            .iter()
            .map(|name| {
                request
                    .family
                    .submodel(&config, name)
                    .ok_or_else(|| Error::UnknownModule {
                        module: name.clone(),
                        family: request.family.to_string(),
                    })
            })
            .collect::<Result<Vec<Submodel>, Error>>()?,
    };

    let converted = convert_submodels(request, &submodels)?;

    if request.clean {
        let cache_dir = cache_dir(request);
        log::info!("cleaning cache {}", cache_dir.display());
        remove_dir_if_present(&cache_dir)?;
    }
    Ok(converted)
}

/// Package an explicit submodel list. [`convert`] resolves the list from
/// the family registry; tooling and tests can pass their own.
pub fn convert_submodels(
    request: &ConvertRequest,
    submodels: &[Submodel],
) -> Result<Vec<ConvertedModule>, Error> {
    let output_root = match &request.output {
        Some(output) => output.clone(),
        None => {
            let derived = request.input.join("_onnx");
            remove_dir_if_present(&derived)?;
            derived
        }
    };
    let cache_dir = cache_dir(request);

    let mut converted = Vec::with_capacity(submodels.len());
    for submodel in submodels {
        log::info!("converting {}", submodel.name);
        let destination = output_root.join(submodel.name);

        match &submodel.plan {
            SubmodelPlan::CopyDir { ignore } => {
                let source = request.input.join(submodel.name);
                if !source.is_dir() {
                    return Err(Error::MissingSource {
                        module: submodel.name.to_string(),
                        path: source,
                    });
                }
                let copied = copy_tree(&source, &destination, ignore)?;
                log::info!("copied {copied} files into {}", destination.display());
            }
            SubmodelPlan::Graph(plan) => {
                let source = resolve_optimized_model(&cache_dir, submodel.name)?;
                let mut model = load_model(&source)?;
                verify_model(&model)?;
                validate_signature(&model.graph, &plan.inputs, &plan.outputs)?;

                for rule in &plan.precision_rules {
                    apply_precision_rule(model.graph.mut_or_insert_default(), rule)?;
                }
                if plan.normalize_io {
                    normalize_model_io(&mut model);
                }

                let options = if request.external_data {
                    SaveOptions::external()
                } else {
                    SaveOptions::default()
                };
                save_model(&mut model, &destination.join(MODEL_FILE), &options)?;
            }
        }

        converted.push(ConvertedModule {
            name: submodel.name.to_string(),
            path: destination,
        });
    }
    Ok(converted)
}

/// One `fix-io` invocation: the standalone boundary normalizer.
#[derive(Debug, Clone)]
pub struct FixIoRequest {
    /// Graph definition file to patch.
    pub input: PathBuf,
    /// Output file, `converted.onnx` next to the input when absent.
    pub output: Option<PathBuf>,
    /// Externalize large tensor payloads.
    pub external_data: bool,
}

/// Widen the float16 boundaries of a single model file.
///
/// Returns the output path and the number of rewritten boundaries.
pub fn fix_io(request: &FixIoRequest) -> Result<(PathBuf, usize), Error> {
    let output = match &request.output {
        Some(output) => output.clone(),
        None => {
            let parent = request.input.parent().unwrap_or_else(|| Path::new("."));
            parent.join("converted.onnx")
        }
    };

    let mut model = load_model(&request.input)?;
    verify_model(&model)?;
    let rewrites = normalize_model_io(&mut model);

    let options = if request.external_data {
        SaveOptions::external()
    } else {
        SaveOptions::default()
    };
    save_model(&mut model, &output, &options)?;
    Ok((output, rewrites.len()))
}

fn cache_dir(request: &ConvertRequest) -> PathBuf {
    request
        .cache_dir
        .clone()
        .unwrap_or_else(|| request.input.join(CACHE_DIR))
}

fn remove_dir_if_present(path: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Recursively copy `source` into `destination`, skipping files whose name
/// matches an ignore pattern. Patterns are exact file names, or suffix
/// matches when prefixed with `*`. Returns the number of files copied.
pub fn copy_tree(source: &Path, destination: &Path, ignore: &[&str]) -> Result<u64, Error> {
    fs::create_dir_all(destination)?;
    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let name = entry.file_name();
        let target = destination.join(&name);
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &target, ignore)?;
        } else {
            let name = name.to_string_lossy();
            if ignored(&name, ignore) {
                continue;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

fn ignored(name: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == *pattern,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_patterns_match_names_and_suffixes() {
        assert!(ignored("tokenizer_config.json", &["tokenizer_config.json"]));
        assert!(ignored("my_tokenizer_config.json", &["*tokenizer_config.json"]));
        assert!(!ignored("tokenizer.json", &["tokenizer_config.json"]));
    }
}
