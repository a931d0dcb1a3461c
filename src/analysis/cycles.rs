use crate::analysis::provider_map::{ProvidedKind, ProvidedType, TypeMap};
use crate::errors::{Diag, DiagKind};
use crate::model::{Program, TypeId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, depth_first_search};
use std::collections::{BTreeMap, HashMap};

/// Rejects any type whose transitive provider closure reaches itself.
///
/// The dependency graph has an edge from each provided type to every input
/// type that is itself present in the map; types absent from the map are
/// deferred to the solver, where they surface as missing providers. Values
/// and injector arguments have no inputs and so are roots. The DFS is the
/// classic three-color traversal: a back edge is a cycle.
pub fn verify_acyclic(program: &Program, provider_map: &TypeMap<ProvidedType>) -> Vec<Diag> {
    let mut graph = DiGraph::<TypeId, ()>::new();
    let mut nodes: BTreeMap<TypeId, NodeIndex> = BTreeMap::new();
    for ty in provider_map.keys() {
        nodes.insert(ty, graph.add_node(ty));
    }

    for (ty, provided) in provider_map.iter() {
        let inputs: Vec<TypeId> = match &provided.kind {
            ProvidedKind::Provider(p) => p.inputs.iter().map(|input| input.ty).collect(),
            ProvidedKind::Field(f) => vec![f.parent],
            ProvidedKind::Value(_) | ProvidedKind::Arg { .. } => Vec::new(),
        };
        for input in inputs {
            if let Some(&target) = nodes.get(&input) {
                graph.add_edge(nodes[&ty], target, ());
            }
        }
    }

    let mut predecessor: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut diags = Vec::new();
    let starts: Vec<NodeIndex> = nodes.values().copied().collect();
    depth_first_search(&graph, starts, |event| {
        match event {
            DfsEvent::TreeEdge(from, to) => {
                predecessor.insert(to, from);
            }
            DfsEvent::BackEdge(from, to) => {
                // `to` is on the DFS stack: it reaches `from`, whose input it
                // is, so the chain to -> ... -> from -> to is a cycle.
                let mut chain = vec![graph[from]];
                let mut current = from;
                while current != to {
                    current = predecessor[&current];
                    chain.push(graph[current]);
                }
                chain.reverse();
                diags.push(cycle_error(program, provider_map, &chain));
            }
            _ => {}
        }
        Control::<()>::Continue
    });
    diags
}

/// `chain` starts at the type that reaches itself and follows dependency
/// order; the error repeats the starting type at the end of the rendering.
fn cycle_error(
    program: &Program,
    provider_map: &TypeMap<ProvidedType>,
    chain: &[TypeId],
) -> Diag {
    let start = chain[0];
    let mut rendered: Vec<String> = chain.iter().map(|&ty| program.display_type(ty)).collect();
    rendered.push(program.display_type(start));
    let diag = Diag::new(
        DiagKind::Cycle,
        format!(
            "cycle for {}: {}",
            program.display_type(start),
            rendered.join(" -> ")
        ),
    );
    match provider_map.at(start) {
        Some(provided) => match &provided.kind {
            ProvidedKind::Provider(p) => diag.at(p.pos),
            ProvidedKind::Field(f) => diag.at(f.pos),
            ProvidedKind::Value(v) => diag.at(v.pos),
            ProvidedKind::Arg { .. } => diag,
        },
        None => diag,
    }
}
