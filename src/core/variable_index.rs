//! Reverse index from variable name to the factors that reference it.
//!
//! Built by a single scan over a factor graph and read-only afterward. The
//! dual-graph builder uses it to find, for a given primal variable, every
//! constraint factor whose Jacobian has a block at that variable.

use std::collections::HashMap;

use crate::factors::{Keyed, graph::FactorGraph};

/// Map from variable name to the ordered positions of the factors touching it.
#[derive(Debug, Clone, Default)]
pub struct VariableIndex {
    index: HashMap<String, Vec<usize>>,
}

impl VariableIndex {
    /// Build the index by scanning `graph` once.
    ///
    /// Factor positions appear in each entry in graph order.
    pub fn from_graph<F: Keyed>(graph: &FactorGraph<F>) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, factor) in graph.iter().enumerate() {
            for key in factor.keys() {
                index.entry(key.clone()).or_default().push(position);
            }
        }
        VariableIndex { index }
    }

    /// Factor positions referencing `key`; empty when the key is unknown.
    pub fn factors_of(&self, key: &str) -> &[usize] {
        self.index.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// All indexed variable names in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<&String> {
        let mut keys: Vec<_> = self.index.keys().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
