//! Declared I/O contracts.
//!
//! Each exported submodel is expected to present a fixed invocation
//! surface: named inputs and outputs with known element types and shapes.
//! [`validate_signature`] checks a deserialized graph against such a
//! contract before any rewrite runs.

use protobuf::MessageField;

use crate::error::Error;
use crate::ir::ElementType;
use crate::protos::{tensor_shape_proto, type_proto, GraphProto, TypeProto, ValueInfoProto};

/// One dimension of an expected tensor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Must equal this extent (a symbolic dimension in the graph is
    /// accepted, the exporter may have generalized a traced extent).
    Fixed(i64),
    /// Symbolic dimension, any extent accepted.
    Named(&'static str),
    /// Unconstrained.
    Any,
}

/// An expected boundary tensor: name, element type and shape.
#[derive(Debug, Clone, derive_new::new)]
pub struct TensorSpec {
    /// Tensor name at the graph boundary.
    pub name: String,
    /// Expected element type.
    pub elem_type: ElementType,
    /// Expected dimensions, in order.
    pub dims: Vec<Dim>,
}

impl TensorSpec {
    /// Shorthand used by registry tables.
    pub fn tensor(name: &str, elem_type: ElementType, dims: &[Dim]) -> Self {
        Self::new(name.to_string(), elem_type, dims.to_vec())
    }

    /// Build the boundary descriptor this spec describes. Used when
    /// synthesizing graphs in tests and tooling.
    pub fn to_value_info(&self) -> ValueInfoProto {
        let mut tensor = type_proto::Tensor::new();
        tensor.elem_type = self.elem_type.proto_code();
        let mut shape = crate::protos::TensorShapeProto::new();
        for dim in &self.dims {
            let mut d = tensor_shape_proto::Dimension::new();
            match dim {
                Dim::Fixed(v) => {
                    d.value = Some(tensor_shape_proto::dimension::Value::DimValue(*v));
                }
                Dim::Named(name) => {
                    d.value = Some(tensor_shape_proto::dimension::Value::DimParam(
                        name.to_string(),
                    ));
                }
                Dim::Any => {}
            }
            shape.dim.push(d);
        }
        tensor.shape = MessageField::some(shape);

        let mut type_ = TypeProto::new();
        type_.set_tensor_type(tensor);
        let mut value = ValueInfoProto::new();
        value.name = self.name.clone();
        value.type_ = MessageField::some(type_);
        value
    }
}

/// Check the declared inputs and outputs of `graph` against the expected
/// contract. Order, names, element types and ranks must match; fixed
/// extents must match unless the graph declares the dimension symbolically.
pub fn validate_signature(
    graph: &GraphProto,
    inputs: &[TensorSpec],
    outputs: &[TensorSpec],
) -> Result<(), Error> {
    check_boundary("input", &graph.input, inputs)?;
    check_boundary("output", &graph.output, outputs)
}

fn check_boundary(
    kind: &str,
    declared: &[ValueInfoProto],
    specs: &[TensorSpec],
) -> Result<(), Error> {
    if declared.len() != specs.len() {
        return Err(Error::SignatureMismatch {
            boundary: format!("{kind}s"),
            reason: format!("expected {} tensors, graph declares {}", specs.len(), declared.len()),
        });
    }

    for (idx, (value, spec)) in declared.iter().zip(specs).enumerate() {
        let at = format!("{kind}[{idx}] '{}'", spec.name);
        if value.name != spec.name {
            return Err(Error::SignatureMismatch {
                boundary: at,
                reason: format!("graph declares '{}'", value.name),
            });
        }

        if !value.type_.has_tensor_type() {
            return Err(Error::SignatureMismatch {
                boundary: at,
                reason: "not a tensor".to_string(),
            });
        }
        let tensor = value.type_.tensor_type();
        let found = ElementType::from_proto(tensor.elem_type)?;
        if found != spec.elem_type {
            return Err(Error::SignatureMismatch {
                boundary: at,
                reason: format!("element type {found}, expected {}", spec.elem_type),
            });
        }

        let dims = &tensor.shape.dim;
        if dims.len() != spec.dims.len() {
            return Err(Error::SignatureMismatch {
                boundary: at,
                reason: format!("rank {}, expected {}", dims.len(), spec.dims.len()),
            });
        }
        for (slot, (dim, expected)) in dims.iter().zip(&spec.dims).enumerate() {
            if let Dim::Fixed(extent) = expected {
                match &dim.value {
                    Some(tensor_shape_proto::dimension::Value::DimValue(found))
                        if found != extent =>
                    {
                        return Err(Error::SignatureMismatch {
                            boundary: at,
                            reason: format!("dim {slot} is {found}, expected {extent}"),
                        });
                    }
                    // Symbolic or absent extents satisfy a fixed expectation.
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(inputs: &[TensorSpec], outputs: &[TensorSpec]) -> GraphProto {
        let mut graph = GraphProto::new();
        graph.input = inputs.iter().map(TensorSpec::to_value_info).collect();
        graph.output = outputs.iter().map(TensorSpec::to_value_info).collect();
        graph
    }

    fn sample_spec() -> Vec<TensorSpec> {
        vec![TensorSpec::tensor(
            "sample",
            ElementType::Float16,
            &[Dim::Named("batch"), Dim::Fixed(4), Dim::Fixed(64), Dim::Fixed(64)],
        )]
    }

    fn out_spec() -> Vec<TensorSpec> {
        vec![TensorSpec::tensor(
            "out_sample",
            ElementType::Float16,
            &[Dim::Any, Dim::Fixed(4), Dim::Any, Dim::Any],
        )]
    }

    #[test]
    fn matching_signature_passes() {
        let graph = graph_with(&sample_spec(), &out_spec());
        validate_signature(&graph, &sample_spec(), &out_spec()).unwrap();
    }

    #[test]
    fn symbolic_extent_satisfies_fixed_expectation() {
        let mut loose = sample_spec();
        loose[0].dims[1] = Dim::Named("channels");
        let graph = graph_with(&loose, &out_spec());
        validate_signature(&graph, &sample_spec(), &out_spec()).unwrap();
    }

    #[test]
    fn wrong_element_type_is_rejected() {
        let mut graph_inputs = sample_spec();
        graph_inputs[0].elem_type = ElementType::Float32;
        let graph = graph_with(&graph_inputs, &out_spec());
        let err = validate_signature(&graph, &sample_spec(), &out_spec()).unwrap_err();
        assert!(matches!(err, Error::SignatureMismatch { .. }));
    }

    #[test]
    fn wrong_name_rank_or_extent_is_rejected() {
        let mut renamed = sample_spec();
        renamed[0].name = "latent".to_string();
        let graph = graph_with(&renamed, &out_spec());
        assert!(validate_signature(&graph, &sample_spec(), &out_spec()).is_err());

        let mut flat = sample_spec();
        flat[0].dims.pop();
        let graph = graph_with(&flat, &out_spec());
        assert!(validate_signature(&graph, &sample_spec(), &out_spec()).is_err());

        let mut wide = sample_spec();
        wide[0].dims[2] = Dim::Fixed(128);
        let graph = graph_with(&wide, &out_spec());
        assert!(validate_signature(&graph, &sample_spec(), &out_spec()).is_err());
    }

    #[test]
    fn missing_tensor_is_rejected() {
        let graph = graph_with(&sample_spec(), &[]);
        assert!(validate_signature(&graph, &sample_spec(), &out_spec()).is_err());
    }
}
