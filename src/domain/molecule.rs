// ============================================================
// Layer 3 — Molecular Graph Domain Type
// ============================================================
// A molecule seen as a graph:
//   - nodes are atoms, each carrying an atom-type class id
//   - edges are bonds between two atoms (undirected)
//
// The atom-type id is an index into a fixed vocabulary of
// size `num_atoms`. The same id is both the input feature
// (one-hot) and, for masked atoms, the prediction target.
//
// Reference: Rust Book §5 (Structs), §8 (Collections)

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// One molecule as loaded from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MolecularGraph {
    /// Atom-type class id per atom, in atom order
    pub atom_types: Vec<usize>,

    /// Undirected bonds as pairs of atom indices
    #[serde(default)]
    pub bonds: Vec<[usize; 2]>,
}

impl MolecularGraph {
    pub fn new(atom_types: Vec<usize>, bonds: Vec<[usize; 2]>) -> Self {
        Self { atom_types, bonds }
    }

    pub fn num_atoms(&self) -> usize {
        self.atom_types.len()
    }

    /// Check the graph against a vocabulary of `vocab_size` atom types.
    pub fn validate(&self, vocab_size: usize) -> Result<()> {
        ensure!(!self.atom_types.is_empty(), "molecule has no atoms");
        let n = self.num_atoms();
        if let Some(&bad) = self.atom_types.iter().find(|&&t| t >= vocab_size) {
            anyhow::bail!("atom type {bad} outside vocabulary of size {vocab_size}");
        }
        for &[u, v] in &self.bonds {
            ensure!(u < n && v < n, "bond ({u}, {v}) references a missing atom (n = {n})");
            ensure!(u != v, "self-bond on atom {u}");
        }
        Ok(())
    }

    /// Neighbour lists, one per atom. Duplicate bonds collapse.
    pub fn adjacency_list(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.num_atoms()];
        for &[u, v] in &self.bonds {
            if !adj[u].contains(&v) {
                adj[u].push(v);
                adj[v].push(u);
            }
        }
        adj
    }

    /// Number of distinct bonded neighbours per atom.
    pub fn degrees(&self) -> Vec<usize> {
        self.adjacency_list().iter().map(Vec::len).collect()
    }

    /// `true` for every atom that lies on at least one ring.
    ///
    /// An atom is on a ring exactly when one of its bonds is not a bridge,
    /// so this runs a single low-link DFS and marks both ends of every
    /// non-bridge edge.
    pub fn ring_membership(&self) -> Vec<bool> {
        let adj = self.adjacency_list();
        let n = adj.len();
        let mut disc = vec![usize::MAX; n];
        let mut low = vec![0usize; n];
        let mut in_ring = vec![false; n];
        let mut timer = 0usize;

        for root in 0..n {
            if disc[root] != usize::MAX {
                continue;
            }
            // Iterative DFS: (node, parent, next neighbour slot)
            let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];
            disc[root] = timer;
            low[root] = timer;
            timer += 1;

            while let Some(&mut (node, parent, ref mut slot)) = stack.last_mut() {
                if *slot < adj[node].len() {
                    let next = adj[node][*slot];
                    *slot += 1;
                    if next == parent {
                        continue;
                    }
                    if disc[next] == usize::MAX {
                        disc[next] = timer;
                        low[next] = timer;
                        timer += 1;
                        stack.push((next, node, 0));
                    } else {
                        // Back edge closes a ring
                        low[node] = low[node].min(disc[next]);
                        in_ring[node] = true;
                        in_ring[next] = true;
                    }
                } else {
                    stack.pop();
                    if parent != usize::MAX {
                        low[parent] = low[parent].min(low[node]);
                        // Tree edge parent-node is not a bridge
                        if low[node] <= disc[parent] {
                            in_ring[node] = true;
                            in_ring[parent] = true;
                        }
                    }
                }
            }
        }
        in_ring
    }
}
