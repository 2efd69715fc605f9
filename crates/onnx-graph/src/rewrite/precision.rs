//! Precision patches for positional-embedding subgraphs.
//!
//! Half-precision export truncates the frequency range of rotary and
//! sinusoidal embeddings. The fix is to carry the contraction that builds
//! the embedding angles in float64 and drop back to float16 only after the
//! trigonometric consumers.
//!
//! Target nodes are matched by op type and topological position under a
//! name-scope anchor rather than by exporter-emitted node names, so the
//! patch survives renames between exporter versions. A scope that matches
//! nothing is an error instead of a silent skip.

use crate::editor::{cast_node, collect_names, fresh_name, set_boundary_elem_type};
use crate::error::Error;
use crate::ir::{ElementType, NodeType};
use crate::protos::GraphProto;

/// Declarative description of one precision patch.
#[derive(Debug, Clone)]
pub struct PrecisionRule {
    /// Name prefix anchoring the subgraph, e.g. `/pos_embed/`.
    pub scope: String,
    /// Op type whose primary input is widened.
    pub widen: NodeType,
    /// Element type the primary input is widened to.
    pub widen_to: ElementType,
    /// Downstream op types whose inputs are narrowed again.
    pub narrow: Vec<NodeType>,
    /// Element type the downstream inputs are narrowed to.
    pub narrow_to: ElementType,
}

impl PrecisionRule {
    /// The rotary positional-embedding patch: contraction inputs to
    /// float64, trigonometric consumers back to float16.
    pub fn rope_f64(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            widen: NodeType::Einsum,
            widen_to: ElementType::Float64,
            narrow: vec![NodeType::Sin, NodeType::Cos],
            narrow_to: ElementType::Float16,
        }
    }
}

/// Nodes rewritten by [`apply_precision_rule`].
#[derive(Debug, Default, Clone)]
pub struct PrecisionPatch {
    /// Names of the nodes whose primary input was widened.
    pub widened: Vec<String>,
    /// Names of the consumer nodes whose inputs were narrowed.
    pub narrowed: Vec<String>,
}

/// Apply `rule` to `graph`.
///
/// Every `rule.widen` node under the scope anchor, in topological order,
/// gets a cast to `rule.widen_to` inserted ahead of its primary input; a
/// primary input that is a declared graph input also has its declared type
/// widened. Every `rule.narrow` node under the anchor then gets casts to
/// `rule.narrow_to` inserted ahead of each of its inputs. Inserted nodes
/// carry collision-checked generated names and are placed directly before
/// their consumer, preserving topological order.
pub fn apply_precision_rule(
    graph: &mut GraphProto,
    rule: &PrecisionRule,
) -> Result<PrecisionPatch, Error> {
    let mut used = collect_names(graph);
    let mut patch = PrecisionPatch::default();

    let widen_targets = select_nodes(graph, &rule.scope, |op| rule.widen.matches(op));
    if widen_targets.is_empty() {
        return Err(Error::ScopeMatchedNothing {
            scope: rule.scope.clone(),
            op: rule.widen.to_string(),
        });
    }

    for target in widen_targets {
        // Insertions shift indices, so targets are tracked by their unique
        // node name and re-resolved here.
        let idx = position_of(graph, &target);
        let Some(source) = graph.node[idx].input.first().cloned() else {
            continue;
        };

        if let Some(input) = graph.input.iter_mut().find(|i| i.name == source) {
            set_boundary_elem_type(input, rule.widen_to);
            log::info!("graph input {source} widened to {}", rule.widen_to);
        }

        let out = fresh_name(&mut used, &format!("{source}_cast_to_{}", rule.widen_to));
        graph
            .node
            .insert(idx, cast_node(&out, &source, &out, rule.widen_to));
        graph.node[idx + 1].input[0] = out;
        log::info!("widened {} input of {target} to {}", rule.widen, rule.widen_to);
        patch.widened.push(target);
    }

    let narrow_targets = select_nodes(graph, &rule.scope, |op| {
        rule.narrow.iter().any(|n| n.matches(op))
    });
    for target in narrow_targets {
        // Every inserted cast shifts the consumer down one slot.
        let mut idx = position_of(graph, &target);
        let arity = graph.node[idx].input.len();
        for slot in 0..arity {
            let source = graph.node[idx].input[slot].clone();
            if source.is_empty() {
                continue;
            }
            let out = fresh_name(&mut used, &format!("{source}_cast_to_{}", rule.narrow_to));
            graph
                .node
                .insert(idx, cast_node(&out, &source, &out, rule.narrow_to));
            idx += 1;
            graph.node[idx].input[slot] = out;
        }
        log::info!("narrowed inputs of {target} to {}", rule.narrow_to);
        patch.narrowed.push(target);
    }

    Ok(patch)
}

/// Names of the nodes under `scope` whose op type satisfies `matches`, in
/// node-list (topological) order.
fn select_nodes(
    graph: &GraphProto,
    scope: &str,
    matches: impl Fn(&str) -> bool,
) -> Vec<String> {
    graph
        .node
        .iter()
        .filter(|node| node.name.starts_with(scope) && matches(&node.op_type))
        .map(|node| node.name.clone())
        .collect()
}

fn position_of(graph: &GraphProto, name: &str) -> usize {
    graph
        .node
        .iter()
        .position(|node| node.name == name)
        .expect("rewrite target vanished from the graph")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{boundary_elem_type, is_topologically_sorted, value_info};
    use crate::protos::NodeProto;

    fn node(name: &str, op: &str, inputs: &[&str], outputs: &[&str]) -> NodeProto {
        let mut node = NodeProto::new();
        node.name = name.to_string();
        node.op_type = op.to_string();
        node.input = inputs.iter().map(|s| s.to_string()).collect();
        node.output = outputs.iter().map(|s| s.to_string()).collect();
        node
    }

    /// img_ids -> Einsum -> Concat -> {Sin, Cos}, all under /pos_embed/,
    /// plus one Einsum outside the scope.
    fn rope_graph() -> GraphProto {
        let mut graph = GraphProto::new();
        graph.input.push(value_info("img_ids", ElementType::Float16));
        graph.input.push(value_info("freqs", ElementType::Float16));
        graph.output.push(value_info("emb", ElementType::Float16));
        graph.node.push(node(
            "/pos_embed/Einsum",
            "Einsum",
            &["img_ids", "freqs"],
            &["angles"],
        ));
        graph.node.push(node(
            "/pos_embed/Concat",
            "Concat",
            &["angles"],
            &["angles_cat"],
        ));
        graph
            .node
            .push(node("/pos_embed/Sin", "Sin", &["angles_cat"], &["sin"]));
        graph
            .node
            .push(node("/pos_embed/Cos", "Cos", &["angles_cat"], &["cos"]));
        graph
            .node
            .push(node("/other/Einsum", "Einsum", &["sin", "cos"], &["emb"]));
        graph
    }

    #[test]
    fn widens_contraction_and_narrows_trig() {
        let mut graph = rope_graph();
        let patch = apply_precision_rule(&mut graph, &PrecisionRule::rope_f64("/pos_embed/"))
            .unwrap();

        assert_eq!(patch.widened, vec!["/pos_embed/Einsum"]);
        assert_eq!(patch.narrowed, vec!["/pos_embed/Sin", "/pos_embed/Cos"]);

        // Declared input widened to float64.
        let img_ids = graph.input.iter().find(|i| i.name == "img_ids").unwrap();
        assert_eq!(
            boundary_elem_type(img_ids),
            Some(ElementType::Float64.proto_code())
        );
        // Untouched second operand.
        let freqs = graph.input.iter().find(|i| i.name == "freqs").unwrap();
        assert_eq!(
            boundary_elem_type(freqs),
            Some(ElementType::Float16.proto_code())
        );

        // Cast feeds the einsum's first input.
        let einsum = graph
            .node
            .iter()
            .find(|n| n.name == "/pos_embed/Einsum")
            .unwrap();
        assert_eq!(einsum.input[0], "img_ids_cast_to_float64");
        assert_eq!(einsum.input[1], "freqs");

        // Both trig nodes read through a narrowing cast with unique names.
        let sin = graph.node.iter().find(|n| n.name == "/pos_embed/Sin").unwrap();
        let cos = graph.node.iter().find(|n| n.name == "/pos_embed/Cos").unwrap();
        assert_eq!(sin.input[0], "angles_cat_cast_to_float16");
        assert_eq!(cos.input[0], "angles_cat_cast_to_float16_0");

        // The out-of-scope einsum is untouched.
        let other = graph.node.iter().find(|n| n.name == "/other/Einsum").unwrap();
        assert_eq!(other.input, vec!["sin", "cos"]);

        assert!(is_topologically_sorted(&graph));
    }

    #[test]
    fn multi_input_consumers_get_one_cast_per_slot() {
        let mut graph = GraphProto::new();
        graph.input.push(value_info("a", ElementType::Float16));
        graph.input.push(value_info("b", ElementType::Float16));
        graph
            .node
            .push(node("/pe/Einsum", "Einsum", &["a", "b"], &["x"]));
        graph.node.push(node("/pe/Mul", "Mul", &["x", "b"], &["y"]));
        graph.output.push(value_info("y", ElementType::Float16));

        let rule = PrecisionRule {
            scope: "/pe/".to_string(),
            widen: NodeType::Einsum,
            widen_to: ElementType::Float64,
            narrow: vec![NodeType::Mul],
            narrow_to: ElementType::Float16,
        };
        apply_precision_rule(&mut graph, &rule).unwrap();

        let mul = graph.node.iter().find(|n| n.name == "/pe/Mul").unwrap();
        assert_eq!(mul.input[0], "x_cast_to_float16");
        assert_eq!(mul.input[1], "b_cast_to_float16");
        assert!(is_topologically_sorted(&graph));
    }

    #[test]
    fn empty_scope_is_an_error() {
        let mut graph = rope_graph();
        let err = apply_precision_rule(&mut graph, &PrecisionRule::rope_f64("/missing/"))
            .unwrap_err();
        assert!(matches!(err, Error::ScopeMatchedNothing { .. }));
    }

    #[test]
    fn multiple_contractions_in_scope_each_get_a_cast() {
        let mut graph = rope_graph();
        graph.node.insert(
            1,
            node(
                "/pos_embed/Einsum_1",
                "Einsum",
                &["img_ids", "freqs"],
                &["angles2"],
            ),
        );

        let patch = apply_precision_rule(&mut graph, &PrecisionRule::rope_f64("/pos_embed/"))
            .unwrap();
        assert_eq!(
            patch.widened,
            vec!["/pos_embed/Einsum", "/pos_embed/Einsum_1"]
        );

        // Same source tensor, two casts, no name collision.
        let first = graph
            .node
            .iter()
            .find(|n| n.name == "/pos_embed/Einsum")
            .unwrap();
        let second = graph
            .node
            .iter()
            .find(|n| n.name == "/pos_embed/Einsum_1")
            .unwrap();
        assert_eq!(first.input[0], "img_ids_cast_to_float64");
        assert_eq!(second.input[0], "img_ids_cast_to_float64_0");
        assert!(is_topologically_sorted(&graph));
    }
}
