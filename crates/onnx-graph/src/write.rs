//! Model persistence.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::Bytes;
use protobuf::Message;

use crate::error::Error;
use crate::ir::ElementType;
use crate::protos::{
    tensor_proto::DataLocation, GraphProto, ModelProto, StringStringEntryProto, TensorProto,
};

/// Serialization settings.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Move large tensor payloads into a sibling `.data` file.
    pub external_data: bool,
    /// Minimum payload size in bytes for externalization.
    pub size_threshold: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            external_data: false,
            size_threshold: 1024,
        }
    }
}

impl SaveOptions {
    /// Default settings with externalization enabled.
    pub fn external() -> Self {
        Self {
            external_data: true,
            ..Self::default()
        }
    }
}

/// Write `model` to `path`, replacing any previous model and data file.
///
/// With externalization enabled, every initializer payload at or above the
/// size threshold is appended to a single sibling file named
/// `{file name}.data` and replaced by a location/offset/length reference.
/// The mutation stays in the model so the caller sees exactly what was
/// written.
pub fn save_model(model: &mut ModelProto, path: &Path, options: &SaveOptions) -> Result<(), Error> {
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| Error::InvalidModelPath(path.to_path_buf()))?;
    let location = format!("{file_name}.data");
    let data_path = path.with_file_name(&location);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    remove_stale(path)?;
    remove_stale(&data_path)?;

    if options.external_data {
        let mut data_file = BufWriter::new(File::create(&data_path)?);
        let mut written = 0u64;
        let count = externalize_graph(
            model.graph.mut_or_insert_default(),
            &location,
            options.size_threshold,
            &mut data_file,
            &mut written,
        )?;
        data_file.flush()?;
        if count == 0 {
            // Nothing crossed the threshold, don't leave an empty sibling.
            fs::remove_file(&data_path)?;
        } else {
            log::info!("externalized {count} tensors ({written} bytes) into {location}");
        }
    }

    let mut file = BufWriter::new(File::create(path)?);
    model.write_to_writer(&mut file)?;
    file.flush()?;
    log::info!("saved model {}", path.display());
    Ok(())
}

fn remove_stale(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn externalize_graph(
    graph: &mut GraphProto,
    location: &str,
    threshold: usize,
    out: &mut impl Write,
    written: &mut u64,
) -> Result<usize, Error> {
    let mut count = 0;
    for tensor in graph.initializer.iter_mut() {
        count += externalize_tensor(tensor, location, threshold, out, written)?;
    }
    for node in graph.node.iter_mut() {
        for attr in node.attribute.iter_mut() {
            if let Some(subgraph) = attr.g.as_mut() {
                count += externalize_graph(subgraph, location, threshold, out, written)?;
            }
            for subgraph in attr.graphs.iter_mut() {
                count += externalize_graph(subgraph, location, threshold, out, written)?;
            }
        }
    }
    Ok(count)
}

fn externalize_tensor(
    tensor: &mut TensorProto,
    location: &str,
    threshold: usize,
    out: &mut impl Write,
    written: &mut u64,
) -> Result<usize, Error> {
    if tensor.data_location.enum_value_or_default() == DataLocation::EXTERNAL {
        // Already a reference, nothing to move.
        return Ok(0);
    }
    let payload = match raw_payload(tensor)? {
        Some(payload) if payload.len() >= threshold => payload,
        _ => return Ok(0),
    };

    out.write_all(&payload)?;

    tensor.raw_data = Bytes::new();
    tensor.float_data.clear();
    tensor.double_data.clear();
    tensor.int32_data.clear();
    tensor.int64_data.clear();
    tensor.uint64_data.clear();
    tensor.external_data = vec![
        entry("location", location),
        entry("offset", &written.to_string()),
        entry("length", &payload.len().to_string()),
    ];
    tensor.data_location = DataLocation::EXTERNAL.into();
    *written += payload.len() as u64;
    Ok(1)
}

fn entry(key: &str, value: &str) -> StringStringEntryProto {
    let mut entry = StringStringEntryProto::new();
    entry.key = key.to_string();
    entry.value = value.to_string();
    entry
}

/// The tensor payload as little-endian raw bytes, `None` when the tensor
/// has no payload or stores strings (which stay inline).
fn raw_payload(tensor: &TensorProto) -> Result<Option<Bytes>, Error> {
    if !tensor.raw_data.is_empty() {
        return Ok(Some(tensor.raw_data.clone()));
    }
    if tensor.float_data.is_empty()
        && tensor.double_data.is_empty()
        && tensor.int32_data.is_empty()
        && tensor.int64_data.is_empty()
    {
        return Ok(None);
    }

    let elem = ElementType::from_proto(tensor.data_type)?;
    let bytes = match elem {
        ElementType::Float32 if !tensor.float_data.is_empty() => {
            bytes_of(&tensor.float_data)
        }
        ElementType::Float64 if !tensor.double_data.is_empty() => {
            bytes_of(&tensor.double_data)
        }
        ElementType::Int64 if !tensor.int64_data.is_empty() => bytes_of(&tensor.int64_data),
        ElementType::Int32 if !tensor.int32_data.is_empty() => bytes_of(&tensor.int32_data),
        // Narrow integer types are packed one value per int32_data entry.
        ElementType::Int8 if !tensor.int32_data.is_empty() => {
            let packed: Vec<i8> = tensor.int32_data.iter().map(|&v| v as i8).collect();
            bytes_of(&packed)
        }
        ElementType::Uint8 | ElementType::Bool if !tensor.int32_data.is_empty() => {
            let packed: Vec<u8> = tensor.int32_data.iter().map(|&v| v as u8).collect();
            bytes_of(&packed)
        }
        ElementType::Uint16 if !tensor.int32_data.is_empty() => {
            let packed: Vec<u16> = tensor.int32_data.iter().map(|&v| v as u16).collect();
            bytes_of(&packed)
        }
        // float16 values sit in the low 16 bits of int32_data entries.
        ElementType::Float16 if !tensor.int32_data.is_empty() => {
            let packed: Vec<u16> = tensor
                .int32_data
                .iter()
                .map(|&v| half::f16::from_bits(v as u16).to_bits())
                .collect();
            bytes_of(&packed)
        }
        _ => return Ok(None),
    };
    Ok(Some(bytes))
}

fn bytes_of<T: bytemuck::Pod>(data: &[T]) -> Bytes {
    Bytes::copy_from_slice(bytemuck::cast_slice(data))
}
