//! Boundary type normalization.
//!
//! Graphs optimized to half precision end up declaring float16 inputs and
//! outputs, which many runtime hosts cannot feed directly. This pass widens
//! every connected float16 boundary to float32 and inserts a cast node just
//! inside the boundary, so the graph computes in float16 while presenting a
//! float32 surface.

use std::collections::HashSet;

use crate::editor::{
    boundary_elem_type, cast_node, collect_names, has_consumer, producer, rewire_inputs,
    set_boundary_elem_type,
};
use crate::ir::ElementType;
use crate::protos::{GraphProto, ModelProto, NodeProto};

/// Which side of the graph a rewrite touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// A declared graph input.
    Input,
    /// A declared graph output.
    Output,
}

/// One rewritten boundary tensor.
#[derive(Debug, Clone)]
pub struct BoundaryCast {
    /// Input or output side.
    pub boundary: Boundary,
    /// The declared boundary tensor name.
    pub tensor: String,
    /// Name of the inserted cast node.
    pub cast: String,
}

/// Run [`normalize_io`] on the model's graph.
pub fn normalize_model_io(model: &mut ModelProto) -> Vec<BoundaryCast> {
    normalize_io(model.graph.mut_or_insert_default())
}

/// Widen every connected float16 boundary of `graph` to float32.
///
/// For an input `X`, the declared type becomes float32 and a cast node
/// `X_iocast_{n}` converts back down to float16 ahead of every former
/// consumer of `X`. For an output `Y`, the producing node's slot is renamed
/// to `Y_iocast_{n}` and a cast node of that name converts up to float32
/// under the original name `Y`. The counter `n` runs over inserted casts,
/// inputs first.
///
/// Boundaries that no node touches are skipped untouched, and boundaries of
/// any other element type are ignored, which also makes the pass
/// idempotent.
pub fn normalize_io(graph: &mut GraphProto) -> Vec<BoundaryCast> {
    let fp16 = ElementType::Float16.proto_code();
    let mut used = collect_names(graph);
    let mut cast_count = 0usize;
    let mut rewrites = Vec::new();

    // Inputs. The new casts are collected and prepended in one go so they
    // sit ahead of every consumer in the node list.
    let mut input_casts: Vec<NodeProto> = Vec::new();
    for idx in 0..graph.input.len() {
        if boundary_elem_type(&graph.input[idx]) != Some(fp16) {
            continue;
        }
        let name = graph.input[idx].name.clone();
        if !has_consumer(graph, &name) {
            continue;
        }

        let cast_name = iocast_name(&mut used, &name, &mut cast_count);
        rewire_inputs(graph, &name, &cast_name);
        input_casts.push(cast_node(&cast_name, &name, &cast_name, ElementType::Float16));
        set_boundary_elem_type(&mut graph.input[idx], ElementType::Float32);

        log::info!("input boundary {name}: float16 -> float32, cast {cast_name}");
        rewrites.push(BoundaryCast {
            boundary: Boundary::Input,
            tensor: name,
            cast: cast_name,
        });
    }
    if !input_casts.is_empty() {
        input_casts.append(&mut graph.node);
        graph.node = input_casts;
    }

    // Outputs. The producer keeps feeding float16 under the renamed tensor;
    // the appended cast owns the declared output name.
    for idx in 0..graph.output.len() {
        if boundary_elem_type(&graph.output[idx]) != Some(fp16) {
            continue;
        }
        let name = graph.output[idx].name.clone();
        let Some((node_idx, slot)) = producer(graph, &name) else {
            // Disconnected output, nothing to cast.
            continue;
        };

        let cast_name = iocast_name(&mut used, &name, &mut cast_count);
        graph.node[node_idx].output[slot] = cast_name.clone();
        // Internal consumers keep reading the float16 tensor.
        rewire_inputs(graph, &name, &cast_name);
        graph
            .node
            .push(cast_node(&cast_name, &cast_name, &name, ElementType::Float32));
        set_boundary_elem_type(&mut graph.output[idx], ElementType::Float32);

        log::info!("output boundary {name}: float16 -> float32, cast {cast_name}");
        rewrites.push(BoundaryCast {
            boundary: Boundary::Output,
            tensor: name,
            cast: cast_name,
        });
    }

    rewrites
}

fn iocast_name(used: &mut HashSet<String>, tensor: &str, count: &mut usize) -> String {
    loop {
        let candidate = format!("{tensor}_iocast_{count}");
        *count += 1;
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
}
