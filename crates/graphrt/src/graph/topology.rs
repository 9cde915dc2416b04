use std::collections::HashSet;

use crate::graph::{Graph, GraphError, NodeId, Output};

/// Returns every node reachable from `roots` in dependency order (producers first).
///
/// The walk is iterative so deep chains do not exhaust the stack. Revisiting a node that
/// is still on the walk stack reports [`GraphError::Cycle`].
pub fn topological_order(graph: &Graph, roots: &[Output]) -> Result<Vec<NodeId>, GraphError> {
    let mut order = Vec::new();
    let mut done: HashSet<NodeId> = HashSet::new();
    let mut on_stack: HashSet<NodeId> = HashSet::new();

    for root in roots {
        graph.output_spec(*root)?;
        if done.contains(&root.node) {
            continue;
        }
        // (node, next input slot to visit)
        let mut stack: Vec<(NodeId, usize)> = vec![(root.node, 0)];
        on_stack.insert(root.node);

        while let Some(frame) = stack.last_mut() {
            let (id, slot) = *frame;
            let node = graph.node(id)?;
            if let Some(input) = node.inputs().get(slot) {
                frame.1 += 1;
                let producer = input.node;
                if done.contains(&producer) {
                    continue;
                }
                if !on_stack.insert(producer) {
                    return Err(GraphError::Cycle(producer));
                }
                graph.node(producer)?;
                stack.push((producer, 0));
                continue;
            }
            stack.pop();
            on_stack.remove(&id);
            done.insert(id);
            order.push(id);
        }
    }
    Ok(order)
}
