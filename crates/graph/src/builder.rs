use crate::error::{GraphError, Result};
use crate::types::{EntityGraph, EntityNode};
use casetrail_store::{CaseStore, EntityKind};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Truncation bounds for one graph build.
#[derive(Debug, Clone, Copy)]
pub struct GraphOptions {
    /// Nodes kept, by descending case-wide event count (seed always
    /// survives).
    pub max_nodes: usize,

    /// Minimum shared-event count for an edge to appear.
    pub min_edge_weight: u64,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            max_nodes: 50,
            min_edge_weight: 1,
        }
    }
}

/// Build the one-hop co-occurrence graph around a seed entity.
///
/// Nodes are the seed plus every entity linked to any event the seed is
/// linked to; edge weight between two entities is the number of
/// distinct shared events. Purely derived from stored links, ordered
/// deterministically before truncation so identical inputs give
/// identical graphs.
pub fn build_graph(
    store: &CaseStore,
    seed_kind: EntityKind,
    seed_value: &str,
    opts: &GraphOptions,
) -> Result<EntityGraph> {
    let seed = store
        .entity(seed_kind, seed_value)?
        .ok_or_else(|| GraphError::SeedNotFound {
            entity_type: seed_kind.name().to_string(),
            entity_value: seed_value.to_string(),
        })?;

    // All (event, entity) links over the seed's events, one hop out.
    let links = store.co_occurrence_links(seed.entity_id)?;

    let mut entities_per_event: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for (event_pk, entity_id) in &links {
        entities_per_event
            .entry(*event_pk)
            .or_default()
            .insert(*entity_id);
    }

    // Pair weight = number of distinct events both entities share; one
    // event contributes once per unordered pair.
    let mut pair_weights: BTreeMap<(i64, i64), u64> = BTreeMap::new();
    for entity_ids in entities_per_event.values() {
        let ids: Vec<i64> = entity_ids.iter().copied().collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                *pair_weights.entry((*a, *b)).or_insert(0) += 1;
            }
        }
    }

    let case_counts: HashMap<i64, i64> = store.entity_event_counts()?.into_iter().collect();

    // Candidate nodes in deterministic pre-truncation order: seed
    // first, then descending event count, ties by type and value.
    let mut candidate_ids: BTreeSet<i64> = links.iter().map(|(_, id)| *id).collect();
    candidate_ids.insert(seed.entity_id);

    let mut candidates: Vec<EntityNode> = Vec::with_capacity(candidate_ids.len());
    for entity_id in candidate_ids {
        let Some(row) = store.entity_by_id(entity_id)? else {
            continue;
        };
        candidates.push(EntityNode {
            entity_id: row.entity_id,
            entity_type: row.entity_type,
            entity_value: row.entity_value,
            event_count: case_counts.get(&entity_id).copied().unwrap_or(0),
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            is_seed: entity_id == seed.entity_id,
        });
    }
    candidates.sort_by(|a, b| {
        b.is_seed
            .cmp(&a.is_seed)
            .then(b.event_count.cmp(&a.event_count))
            .then_with(|| a.entity_type.name().cmp(b.entity_type.name()))
            .then_with(|| a.entity_value.cmp(&b.entity_value))
    });
    candidates.truncate(opts.max_nodes);

    let mut graph = EntityGraph::new();
    for node in candidates {
        graph.add_node(node);
    }

    // Edges only between surviving nodes, at or above the weight floor.
    for ((a, b), weight) in &pair_weights {
        if *weight < opts.min_edge_weight {
            continue;
        }
        let (Some(from), Some(to)) = (graph.find_node(*a), graph.find_node(*b)) else {
            continue;
        };
        graph.add_edge(from, to, *weight);
    }

    log::debug!(
        "entity graph for {}:{}: {} nodes, {} edges",
        seed_kind.name(),
        seed_value,
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}
