use std::sync::Arc;

use crate::config::FilterConfig;
use crate::filters::within_radius;
use crate::pbf::{Element, FormatError, Node, PrimitiveBlock};
use crate::sinks::NodeRow;
use crate::utils::{BlockTally, RunCounters, RunSummary};

pub trait BlockProcessor: Send + Sync {
    /// Decode one block into output rows, plus the running totals after it.
    fn process_block(&self, block: PrimitiveBlock) -> Result<(Vec<NodeRow>, RunSummary), FormatError>;
}

pub struct NodeFilterProcessor {
    pub filters: Arc<FilterConfig>,
    pub counters: Arc<RunCounters>,
}

impl BlockProcessor for NodeFilterProcessor {
    fn process_block(&self, block: PrimitiveBlock) -> Result<(Vec<NodeRow>, RunSummary), FormatError> {
        let (rows, tally) = process_block_collect(&block, &self.filters)?;
        let progress = self.counters.add_block(tally);
        Ok((rows, progress))
    }
}

/// Proximity first, then the tag pattern.
pub fn filter_node(node: &Node<'_>, filters: &FilterConfig) -> Option<NodeRow> {
    let (within, distance) = within_radius(
        filters.ref_lat,
        filters.ref_lon,
        node.lat(),
        node.lon(),
        filters.max_distance_km,
    );
    if !within {
        return None;
    }

    if !filters.pattern.matches(node.tags().iter().copied()) {
        return None;
    }
    tracing::trace!("Node {} selected", node.id());

    Some(NodeRow::from_node(
        node,
        filters.distance_enabled().then_some(distance),
    ))
}

pub fn process_block_collect(
    block: &PrimitiveBlock,
    filters: &FilterConfig,
) -> Result<(Vec<NodeRow>, BlockTally), FormatError> {
    let mut rows = Vec::new();
    let mut tally = BlockTally::default();

    for element in block.elements() {
        match element? {
            Element::Node(node) | Element::DenseNode(node) => {
                tally.nodes += 1;
                if let Some(row) = filter_node(&node, filters) {
                    rows.push(row);
                }
            }
            Element::Way => tally.ways += 1,
            Element::Relation => tally.relations += 1,
        }
    }

    tally.matches = rows.len() as u64;
    Ok((rows, tally))
}
