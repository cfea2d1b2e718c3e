use casetrail_store::EntityKind;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node in the entity graph: one entity with its case-wide activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub entity_id: i64,
    pub entity_type: EntityKind,
    pub entity_value: String,

    /// Case-wide number of distinct events linked to this entity.
    pub event_count: i64,

    pub first_seen: String,
    pub last_seen: String,

    /// True for the entity the graph was built around.
    pub is_seed: bool,
}

/// Edge between two co-occurring entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEdge {
    pub source: i64,
    pub target: i64,

    /// Number of distinct events in which both entities appear.
    pub weight: u64,

    /// Endpoint kinds, e.g. `"host-user"`.
    pub edge_type: String,
}

/// Co-occurrence graph around a seed entity. Ephemeral: derived from
/// the store on demand, never persisted.
#[derive(Debug)]
pub struct EntityGraph {
    /// Undirected graph (entity ↔ entity, weighted by shared events).
    pub graph: UnGraph<EntityNode, u64>,

    /// entity_id -> NodeIndex for fast lookup.
    pub entity_index: HashMap<i64, NodeIndex>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            entity_index: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: EntityNode) -> NodeIndex {
        let entity_id = node.entity_id;
        let idx = self.graph.add_node(node);
        self.entity_index.insert(entity_id, idx);
        idx
    }

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, weight: u64) {
        self.graph.add_edge(from, to, weight);
    }

    /// Find node by entity id.
    pub fn find_node(&self, entity_id: i64) -> Option<NodeIndex> {
        self.entity_index.get(&entity_id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes in build order: seed first, then descending case-wide
    /// event count. Stable for snapshots.
    pub fn nodes(&self) -> Vec<&EntityNode> {
        self.graph.node_weights().collect()
    }

    /// Edges as a deterministic list, ordered by endpoint entity ids.
    pub fn edges(&self) -> Vec<EntityEdge> {
        let mut edges: Vec<EntityEdge> = self
            .graph
            .edge_indices()
            .filter_map(|edge_idx| {
                let (a, b) = self.graph.edge_endpoints(edge_idx)?;
                let weight = *self.graph.edge_weight(edge_idx)?;
                let node_a = self.graph.node_weight(a)?;
                let node_b = self.graph.node_weight(b)?;
                Some(EntityEdge {
                    source: node_a.entity_id,
                    target: node_b.entity_id,
                    weight,
                    edge_type: format!(
                        "{}-{}",
                        node_a.entity_type.name(),
                        node_b.entity_type.name()
                    ),
                })
            })
            .collect();
        edges.sort_by(|x, y| (x.source, x.target).cmp(&(y.source, y.target)));
        edges
    }
}

impl Default for EntityGraph {
    fn default() -> Self {
        Self::new()
    }
}
