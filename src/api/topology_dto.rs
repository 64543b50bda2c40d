use serde::{Deserialize, Serialize};

use crate::domain::graph::Graph;
use crate::error::Result;

/// Physical network as stored in a topology JSON file.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDto {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDto>,
    pub links: Vec<LinkDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    pub id: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    pub source: String,
    pub target: String,
    #[serde(default = "default_length")]
    pub length: f64,
}

fn default_length() -> f64 {
    1.0
}

impl TopologyDto {
    pub fn into_graph(self) -> Result<Graph> {
        Graph::from_weighted_edges(self.nodes.into_iter().map(|n| n.id), self.links.into_iter().map(|l| (l.source, l.target, l.length)))
    }
}
