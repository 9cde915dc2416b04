use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::backend::spec::{Backend, BackendError, BackendResult};
use crate::graph::{Graph, GraphError, NodeId, OpKind};

/// Where a node executes after placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Site {
    /// Outer parameter; stays in the outer function.
    Parameter,
    /// Call site already present in the input graph; stays in the outer function.
    Call,
    /// Index into the hybrid's backend list.
    Backend(usize),
}

/// Backend reachable under a placement label.
#[derive(Clone)]
pub struct LabeledBackend {
    pub label: String,
    pub backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for LabeledBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabeledBackend")
            .field("label", &self.label)
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

/// Gives every backend a label: its name when unique in the list, `name#index` otherwise.
pub fn label_backends(backends: Vec<Arc<dyn Backend>>) -> Vec<LabeledBackend> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for backend in &backends {
        *counts.entry(backend.backend_name().to_string()).or_default() += 1;
    }
    backends
        .into_iter()
        .enumerate()
        .map(|(index, backend)| {
            let name = backend.backend_name();
            let label = if counts.get(name).copied().unwrap_or(0) > 1 {
                format!("{name}#{index}")
            } else {
                name.to_string()
            };
            LabeledBackend { label, backend }
        })
        .collect()
}

/// Assigns each node in `order` the first backend accepting its kind.
pub fn place(
    graph: &Graph,
    order: &[NodeId],
    backends: &[LabeledBackend],
) -> BackendResult<HashMap<NodeId, Site>> {
    let mut sites = HashMap::with_capacity(order.len());
    for &id in order {
        let kind = graph.node(id)?.kind();
        let site = match kind {
            OpKind::Parameter => Site::Parameter,
            OpKind::FunctionCall => Site::Call,
            kind => backends
                .iter()
                .position(|candidate| candidate.backend.is_supported(kind))
                .map(Site::Backend)
                .ok_or_else(|| BackendError::UnplaceableOp {
                    op: kind.to_string(),
                })?,
        };
        sites.insert(id, site);
    }
    Ok(sites)
}

/// Nodes sharing a backend and a depth; extracted together into one inner function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub depth: usize,
    pub backend: usize,
    /// Members in dependency order.
    pub nodes: Vec<NodeId>,
}

/// Groups placed nodes into clusters keyed by `(depth, backend)`, in ascending key order.
///
/// `depth(n)` is the maximum over non-parameter inputs `i` of `depth(i)`, plus one when `i`
/// sits elsewhere. Every edge between clusters therefore increases depth, so the key order
/// is a dependency order of the clusters.
pub fn clusters(
    graph: &Graph,
    order: &[NodeId],
    sites: &HashMap<NodeId, Site>,
) -> Result<Vec<Cluster>, GraphError> {
    let mut depths: HashMap<NodeId, usize> = HashMap::with_capacity(order.len());
    let mut grouped: BTreeMap<(usize, usize), Vec<NodeId>> = BTreeMap::new();

    for &id in order {
        let site = sites.get(&id).copied().ok_or(GraphError::MissingNode(id))?;
        let mut depth = 0;
        for input in graph.node(id)?.inputs() {
            let input_site = sites
                .get(&input.node)
                .copied()
                .ok_or(GraphError::MissingNode(input.node))?;
            if input_site == Site::Parameter {
                continue;
            }
            let crossing = usize::from(input_site != site);
            depth = depth.max(depths.get(&input.node).copied().unwrap_or(0) + crossing);
        }
        depths.insert(id, depth);
        if let Site::Backend(backend) = site {
            grouped.entry((depth, backend)).or_default().push(id);
        }
    }

    Ok(grouped
        .into_iter()
        .map(|((depth, backend), nodes)| Cluster {
            depth,
            backend,
            nodes,
        })
        .collect())
}
