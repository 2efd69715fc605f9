//! Low-level surgery helpers over a `GraphProto`.
//!
//! Rewrite passes compose these to insert cast nodes and redirect tensor
//! references while keeping the node list topologically sorted and all
//! names unique.

use std::collections::HashSet;

use protobuf::MessageField;

use crate::ir::ElementType;
use crate::protos::{
    type_proto, AttributeProto, GraphProto, NodeProto, TypeProto, ValueInfoProto,
};

/// Collect every name already taken in the graph: node names plus all
/// tensor names (boundaries, initializers, node inputs/outputs).
pub fn collect_names(graph: &GraphProto) -> HashSet<String> {
    let mut names = HashSet::new();
    for input in &graph.input {
        names.insert(input.name.clone());
    }
    for output in &graph.output {
        names.insert(output.name.clone());
    }
    for initializer in &graph.initializer {
        names.insert(initializer.name.clone());
    }
    for node in &graph.node {
        names.insert(node.name.clone());
        for tensor in node.input.iter().chain(node.output.iter()) {
            names.insert(tensor.clone());
        }
    }
    names
}

/// Return `base` if it is still free, otherwise `base_0`, `base_1`, ...
/// The returned name is recorded in `used`.
pub fn fresh_name(used: &mut HashSet<String>, base: &str) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 0usize;
    loop {
        let candidate = format!("{base}_{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Build a `Cast` node converting `input` into `output` with element type
/// `to`.
pub fn cast_node(name: &str, input: &str, output: &str, to: ElementType) -> NodeProto {
    let mut attr = AttributeProto::new();
    attr.name = "to".to_string();
    attr.type_ = crate::protos::attribute_proto::AttributeType::INT.into();
    attr.i = to.proto_code() as i64;

    let mut node = NodeProto::new();
    node.name = name.to_string();
    node.op_type = "Cast".to_string();
    node.input.push(input.to_string());
    node.output.push(output.to_string());
    node.attribute.push(attr);
    node
}

/// Find the node producing `tensor`, as `(node index, output slot)`.
pub fn producer(graph: &GraphProto, tensor: &str) -> Option<(usize, usize)> {
    graph.node.iter().enumerate().find_map(|(i, node)| {
        node.output
            .iter()
            .position(|out| out == tensor)
            .map(|slot| (i, slot))
    })
}

/// Whether any node consumes `tensor`.
pub fn has_consumer(graph: &GraphProto, tensor: &str) -> bool {
    graph
        .node
        .iter()
        .any(|node| node.input.iter().any(|input| input == tensor))
}

/// Redirect every node input referencing `from` to `to`. Returns the number
/// of rewired references.
pub fn rewire_inputs(graph: &mut GraphProto, from: &str, to: &str) -> usize {
    let mut count = 0;
    for node in graph.node.iter_mut() {
        for input in node.input.iter_mut() {
            if input == from {
                *input = to.to_string();
                count += 1;
            }
        }
    }
    count
}

/// The declared element type code of a boundary descriptor, if it is a
/// tensor.
pub fn boundary_elem_type(value: &ValueInfoProto) -> Option<i32> {
    if value.type_.has_tensor_type() {
        Some(value.type_.tensor_type().elem_type)
    } else {
        None
    }
}

/// Overwrite the declared element type of a boundary descriptor. A
/// descriptor without a tensor type gets one, with an unknown shape.
pub fn set_boundary_elem_type(value: &mut ValueInfoProto, ty: ElementType) {
    value
        .type_
        .mut_or_insert_default()
        .mut_tensor_type()
        .elem_type = ty.proto_code();
}

/// Build a boundary descriptor with the given element type and no shape
/// information.
pub fn value_info(name: &str, ty: ElementType) -> ValueInfoProto {
    let mut tensor = type_proto::Tensor::new();
    tensor.elem_type = ty.proto_code();
    let mut type_ = TypeProto::new();
    type_.set_tensor_type(tensor);

    let mut value = ValueInfoProto::new();
    value.name = name.to_string();
    value.type_ = MessageField::some(type_);
    value
}

/// Whether the node list is topologically sorted: every node input resolves
/// to a graph input, an initializer, or the output of an earlier node.
/// Empty input names (optional inputs) are ignored.
pub fn is_topologically_sorted(graph: &GraphProto) -> bool {
    let mut known: HashSet<&str> = graph.input.iter().map(|i| i.name.as_str()).collect();
    known.extend(graph.initializer.iter().map(|t| t.name.as_str()));

    for node in &graph.node {
        for input in &node.input {
            if !input.is_empty() && !known.contains(input.as_str()) {
                return false;
            }
        }
        known.extend(node.output.iter().map(|o| o.as_str()));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, op: &str, inputs: &[&str], outputs: &[&str]) -> NodeProto {
        let mut node = NodeProto::new();
        node.name = name.to_string();
        node.op_type = op.to_string();
        node.input = inputs.iter().map(|s| s.to_string()).collect();
        node.output = outputs.iter().map(|s| s.to_string()).collect();
        node
    }

    fn simple_graph() -> GraphProto {
        let mut graph = GraphProto::new();
        graph.input.push(value_info("a", ElementType::Float16));
        graph.output.push(value_info("b", ElementType::Float16));
        graph.node.push(node("n0", "Identity", &["a"], &["b"]));
        graph
    }

    #[test]
    fn fresh_name_avoids_collisions() {
        let mut used = HashSet::new();
        used.insert("x".to_string());
        used.insert("x_0".to_string());
        assert_eq!(fresh_name(&mut used, "x"), "x_1");
        assert_eq!(fresh_name(&mut used, "y"), "y");
        assert_eq!(fresh_name(&mut used, "y"), "y_0");
    }

    #[test]
    fn producer_reports_node_and_slot() {
        let mut graph = simple_graph();
        graph
            .node
            .push(node("n1", "Split", &["b"], &["c", "d"]));
        assert_eq!(producer(&graph, "b"), Some((0, 0)));
        assert_eq!(producer(&graph, "d"), Some((1, 1)));
        assert_eq!(producer(&graph, "a"), None);
    }

    #[test]
    fn rewire_updates_every_reference() {
        let mut graph = simple_graph();
        graph.node.push(node("n1", "Relu", &["a"], &["c"]));
        assert_eq!(rewire_inputs(&mut graph, "a", "a2"), 2);
        assert_eq!(graph.node[0].input[0], "a2");
        assert_eq!(graph.node[1].input[0], "a2");
    }

    #[test]
    fn cast_node_carries_target_type() {
        let cast = cast_node("c", "x", "y", ElementType::Float64);
        assert_eq!(cast.op_type, "Cast");
        assert_eq!(cast.attribute[0].name, "to");
        assert_eq!(
            cast.attribute[0].i,
            ElementType::Float64.proto_code() as i64
        );
    }

    #[test]
    fn topological_order_is_detected() {
        let graph = simple_graph();
        assert!(is_topologically_sorted(&graph));

        let mut bad = simple_graph();
        bad.node.insert(0, node("n1", "Relu", &["b"], &["c"]));
        assert!(!is_topologically_sorted(&bad));
    }
}
