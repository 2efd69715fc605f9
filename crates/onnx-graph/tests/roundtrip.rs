//! File round-trips, with and without externalized tensor data.

use bytes::Bytes;
use protobuf::{Message, MessageField};

use onnx_graph::protos::{
    tensor_proto::DataLocation, GraphProto, ModelProto, NodeProto, TensorProto,
};
use onnx_graph::{load_model, save_model, ElementType, SaveOptions};

fn weight(name: &str, bytes: Vec<u8>) -> TensorProto {
    let mut tensor = TensorProto::new();
    tensor.name = name.to_string();
    tensor.data_type = ElementType::Float32.proto_code();
    tensor.dims.push(bytes.len() as i64 / 4);
    tensor.raw_data = Bytes::from(bytes);
    tensor
}

fn sample_model() -> ModelProto {
    let mut graph = GraphProto::new();
    graph.name = "test".to_string();

    let mut node = NodeProto::new();
    node.name = "matmul".to_string();
    node.op_type = "MatMul".to_string();
    node.input = vec!["x".to_string(), "weight".to_string()];
    node.output = vec!["y".to_string()];
    graph.node.push(node);

    // One payload above the externalization threshold, one below.
    graph
        .initializer
        .push(weight("weight", (0..=255u8).cycle().take(4096).collect()));
    graph.initializer.push(weight("bias", vec![1, 2, 3, 4]));

    let mut model = ModelProto::new();
    model.ir_version = 8;
    model.graph = MessageField::some(graph);
    model
}

#[test]
fn plain_round_trip_preserves_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");

    let mut model = sample_model();
    let original = model.write_to_bytes().unwrap();
    save_model(&mut model, &path, &SaveOptions::default()).unwrap();

    let reloaded = load_model(&path).unwrap();
    assert_eq!(reloaded.write_to_bytes().unwrap(), original);
    assert!(!path.with_file_name("model.onnx.data").exists());
}

#[test]
fn external_data_round_trip_restores_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");

    let mut model = sample_model();
    let weight_bytes = model.graph.initializer[0].raw_data.clone();
    save_model(&mut model, &path, &SaveOptions::external()).unwrap();

    // The large payload moved out, the small one stayed inline.
    let weight = &model.graph.initializer[0];
    assert_eq!(
        weight.data_location.enum_value_or_default(),
        DataLocation::EXTERNAL
    );
    assert!(weight.raw_data.is_empty());
    let entries: Vec<(&str, &str)> = weight
        .external_data
        .iter()
        .map(|e| (e.key.as_str(), e.value.as_str()))
        .collect();
    assert!(entries.contains(&("location", "model.onnx.data")));
    assert!(entries.contains(&("offset", "0")));
    assert!(entries.contains(&("length", "4096")));
    assert_eq!(
        model.graph.initializer[1]
            .data_location
            .enum_value_or_default(),
        DataLocation::DEFAULT
    );

    let data_path = path.with_file_name("model.onnx.data");
    assert_eq!(std::fs::metadata(&data_path).unwrap().len(), 4096);

    // Loading inlines the payload again, byte for byte.
    let reloaded = load_model(&path).unwrap();
    let weight = &reloaded.graph.initializer[0];
    assert_eq!(
        weight.data_location.enum_value_or_default(),
        DataLocation::DEFAULT
    );
    assert_eq!(weight.raw_data, weight_bytes);
    assert!(weight.external_data.is_empty());
}

#[test]
fn saving_replaces_stale_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");
    let data_path = path.with_file_name("model.onnx.data");

    let mut model = sample_model();
    save_model(&mut model, &path, &SaveOptions::external()).unwrap();
    assert!(data_path.exists());

    // Saving without externalization removes the stale data sibling.
    let mut model = sample_model();
    save_model(&mut model, &path, &SaveOptions::default()).unwrap();
    assert!(!data_path.exists());
    load_model(&path).unwrap();
}

#[test]
fn missing_external_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.onnx");

    let mut model = sample_model();
    save_model(&mut model, &path, &SaveOptions::external()).unwrap();
    std::fs::remove_file(path.with_file_name("model.onnx.data")).unwrap();

    let err = load_model(&path).unwrap_err();
    assert!(matches!(err, onnx_graph::Error::ExternalData { .. }));
}
