use log::debug;

use crate::error::{Result, VsmError};
use crate::graph::ValueStreamGraph;
use crate::node::NodeId;

/// One horizontal slice of the diagram: every node sharing a depth,
/// ordered by first insertion.
#[derive(Debug, Clone)]
pub struct Level {
    /// Zero-indexed depth, re-based so the furthest upstream level is 0.
    pub depth: usize,
    pub nodes: Vec<NodeId>,
}

/// Partitions the graph into contiguous levels, splicing dummy chains into
/// multi-level edges first. Refuses a cyclic graph.
///
/// Within a level, nodes keep the order in which the build operations first
/// introduced them, so the layout matches the order dependencies were
/// declared.
pub fn assemble_levels(graph: &mut ValueStreamGraph) -> Result<Vec<Level>> {
    if graph.has_cycle() {
        return Err(VsmError::CyclicDependency);
    }
    graph.splice_dummies();

    let Some(min) = graph.nodes.values().map(|n| n.level()).min() else {
        return Ok(Vec::new());
    };
    let max = graph.nodes.values().map(|n| n.level()).max().unwrap_or(min);

    let mut buckets: Vec<Vec<(u64, NodeId)>> = vec![Vec::new(); (max - min + 1) as usize];
    for node in graph.nodes.values() {
        buckets[(node.level() - min) as usize].push((node.ordinal, node.id().clone()));
    }

    let mut levels = Vec::with_capacity(buckets.len());
    for (depth, mut bucket) in buckets.into_iter().enumerate() {
        // Contiguity is guaranteed by the level fixpoint plus dummy
        // splicing; a gap means the builder is broken.
        if bucket.is_empty() {
            return Err(VsmError::NonContiguousLevels(min + depth as i32));
        }
        bucket.sort_by_key(|(ordinal, _)| *ordinal);
        levels.push(Level {
            depth,
            nodes: bucket.into_iter().map(|(_, id)| id).collect(),
        });
    }
    debug!(
        "assembled {} level(s) spanning {} node(s)",
        levels.len(),
        graph.node_count()
    );
    Ok(levels)
}
