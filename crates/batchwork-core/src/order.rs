//! Dependency ordering of entity descriptors.
//!
//! [`Classmap::ordered`] places every parent type before its children using
//! Kahn's algorithm over a parent -> child `petgraph` graph. Whenever several
//! descriptors are ready at once they are taken in repository-name order, so
//! the result does not depend on the order the caller listed them in.
//!
//! Create and update processing walk [`Classmap::iter`]; deletes walk
//! [`Classmap::delete_order`], the exact reverse.

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::descriptor::EntityDescriptor;
use crate::error::CoreError;

/// Descriptors in dependency order (parents first).
#[derive(Debug, Clone, Default)]
pub struct Classmap {
    entries: Vec<EntityDescriptor>,
}

impl Classmap {
    /// Validates and orders `descriptors`.
    ///
    /// Fails on duplicate repositories or type ids, on a parent type that is
    /// not part of the set, and on cycles.
    pub fn ordered(descriptors: Vec<EntityDescriptor>) -> Result<Self, CoreError> {
        let mut by_type: HashMap<&str, usize> = HashMap::new();
        let mut by_repository: HashMap<&str, usize> = HashMap::new();
        for (i, d) in descriptors.iter().enumerate() {
            if by_repository.insert(d.repository(), i).is_some() {
                return Err(CoreError::DuplicateRepository {
                    repository: d.repository().to_string(),
                });
            }
            if by_type.insert(d.type_id(), i).is_some() {
                return Err(CoreError::DuplicateType {
                    type_id: d.type_id().to_string(),
                });
            }
        }

        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(descriptors.len(), descriptors.len());
        let nodes: Vec<NodeIndex> = (0..descriptors.len()).map(|i| graph.add_node(i)).collect();
        for (i, d) in descriptors.iter().enumerate() {
            if let Some(parent) = d.parent_type_id() {
                let p = by_type.get(parent).copied().ok_or_else(|| CoreError::UnknownParentType {
                    repository: d.repository().to_string(),
                    parent_type_id: parent.to_string(),
                })?;
                graph.add_edge(nodes[p], nodes[i], ());
            }
        }

        let mut in_degree: Vec<usize> = nodes
            .iter()
            .map(|&n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        // Keyed by repository name so ties break the same way for any input order.
        let mut ready: BTreeMap<&str, usize> = descriptors
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] == 0)
            .map(|(i, d)| (d.repository(), i))
            .collect();

        let mut order = Vec::with_capacity(descriptors.len());
        while let Some((_, i)) = ready.pop_first() {
            order.push(i);
            for child in graph.neighbors_directed(nodes[i], Direction::Outgoing) {
                let c = graph[child];
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    ready.insert(descriptors[c].repository(), c);
                }
            }
        }

        if order.len() != descriptors.len() {
            let stuck = (0..descriptors.len())
                .find(|i| !order.contains(i))
                .map(|i| descriptors[i].repository().to_string())
                .unwrap_or_default();
            return Err(CoreError::DependencyCycle { repository: stuck });
        }

        let mut slots: Vec<Option<EntityDescriptor>> = descriptors.into_iter().map(Some).collect();
        let entries = order.iter().filter_map(|&i| slots[i].take()).collect();
        Ok(Classmap { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors in create/update order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &EntityDescriptor> {
        self.entries.iter()
    }

    /// Descriptors in delete order (children first).
    pub fn delete_order(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entries.iter().rev()
    }

    /// Repository names in create/update order.
    pub fn repositories(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.repository()).collect()
    }

    pub fn get(&self, repository: &str) -> Option<&EntityDescriptor> {
        self.entries.iter().find(|d| d.repository() == repository)
    }

    pub fn find_by_type(&self, type_id: &str) -> Option<&EntityDescriptor> {
        self.entries.iter().find(|d| d.type_id() == type_id)
    }

    /// The descriptor of `descriptor`'s parent type.
    pub fn parent_of(&self, descriptor: &EntityDescriptor) -> Option<&EntityDescriptor> {
        let parent = descriptor.parent_type_id()?;
        self.entries
            .iter()
            .find(|d| d.repository() != descriptor.repository() && d.type_id() == parent)
    }

    /// Descriptors whose parent type is `type_id`.
    pub fn children_of(&self, type_id: &str) -> Vec<&EntityDescriptor> {
        self.entries
            .iter()
            .filter(|d| d.parent_type_id() == Some(type_id))
            .collect()
    }
}
