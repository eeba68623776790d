use anyhow::Result;

use crate::pbf::Node;

pub mod text;


pub use self::text::TextRowSink;

/// An accepted node, detached from its block so it can cross to the writer.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRow {
    pub lat: f64,
    pub lon: f64,
    pub tags: Vec<(String, String)>,
    /// Present only when distance filtering is enabled.
    pub distance_km: Option<f64>,
}

impl NodeRow {
    pub fn from_node(node: &Node<'_>, distance_km: Option<f64>) -> Self {
        Self {
            lat: node.lat(),
            lon: node.lon(),
            tags: node
                .tags()
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            distance_km,
        }
    }
}

pub trait RowSink: Send {
    fn add_row(&mut self, row: NodeRow) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
