//! Model loading.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;
use protobuf::Message;

use crate::error::Error;
use crate::protos::{tensor_proto::DataLocation, GraphProto, ModelProto, TensorProto};

/// Parse a model file and inline any externally stored tensor payloads.
///
/// External data files are resolved relative to the model's directory.
/// After loading, every initializer carries its bytes in `raw_data` so the
/// model can be rewritten and re-serialized to a different location.
pub fn load_model(path: &Path) -> Result<ModelProto, Error> {
    log::info!("loading model {}", path.display());
    let mut file = File::open(path)?;
    let mut model = ModelProto::parse_from_reader(&mut file)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let inlined = inline_external_data(model.graph.mut_or_insert_default(), base)?;
    if inlined > 0 {
        log::debug!("inlined {inlined} external tensors");
    }
    Ok(model)
}

fn inline_external_data(graph: &mut GraphProto, base: &Path) -> Result<usize, Error> {
    let mut count = 0;
    for tensor in graph.initializer.iter_mut() {
        count += inline_tensor(tensor, base)?;
    }
    // Subgraphs held in control-flow attributes carry their own
    // initializers.
    for node in graph.node.iter_mut() {
        for attr in node.attribute.iter_mut() {
            if let Some(subgraph) = attr.g.as_mut() {
                count += inline_external_data(subgraph, base)?;
            }
            for subgraph in attr.graphs.iter_mut() {
                count += inline_external_data(subgraph, base)?;
            }
        }
    }
    Ok(count)
}

fn inline_tensor(tensor: &mut TensorProto, base: &Path) -> Result<usize, Error> {
    if tensor.data_location.enum_value_or_default() != DataLocation::EXTERNAL {
        return Ok(0);
    }

    let mut location = None;
    let mut offset = 0u64;
    let mut length = None;
    for entry in &tensor.external_data {
        match entry.key.as_str() {
            "location" => location = Some(entry.value.clone()),
            "offset" => offset = parse_entry(tensor, "offset", &entry.value)?,
            "length" => length = Some(parse_entry(tensor, "length", &entry.value)?),
            _ => {}
        }
    }
    let location = location.ok_or_else(|| Error::ExternalData {
        tensor: tensor.name.clone(),
        reason: "missing location entry".to_string(),
    })?;

    let path = base.join(&location);
    let mut file = File::open(&path).map_err(|err| Error::ExternalData {
        tensor: tensor.name.clone(),
        reason: format!("cannot open {}: {err}", path.display()),
    })?;
    let file_len = file.metadata()?.len();
    let length = length.unwrap_or_else(|| file_len.saturating_sub(offset));
    if offset.checked_add(length).map_or(true, |end| end > file_len) {
        return Err(Error::ExternalData {
            tensor: tensor.name.clone(),
            reason: format!(
                "range {offset}+{length} exceeds {} bytes in {}",
                file_len,
                path.display()
            ),
        });
    }

    file.seek(SeekFrom::Start(offset))?;
    let mut payload = vec![0u8; length as usize];
    file.read_exact(&mut payload)?;

    tensor.raw_data = Bytes::from(payload);
    tensor.external_data.clear();
    tensor.data_location = DataLocation::DEFAULT.into();
    Ok(1)
}

fn parse_entry(tensor: &TensorProto, key: &str, value: &str) -> Result<u64, Error> {
    value.parse().map_err(|_| Error::ExternalData {
        tensor: tensor.name.clone(),
        reason: format!("malformed {key} entry '{value}'"),
    })
}
