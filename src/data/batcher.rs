// ============================================================
// Layer 4 — Graph Batcher
// ============================================================
// Implements Burn's Batcher trait to collate a Vec of masked
// molecules into one disconnected "super graph":
//
//   nodes      [total_nodes, feat_dim]     — all node rows stacked
//   adjacency  [total_nodes, total_nodes]  — block diagonal, one
//                                           block per molecule
//   masked_atom_index [total_masked]       — positions into the
//                                           stacked node rows
//   masked_atom_type  [total_masked]       — targets
//
// Masked positions are shifted by the number of nodes of all
// preceding molecules in the batch, so they index the stacked
// rows directly.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::MaskedGraphSample;

/// A batch of masked molecules ready for the encoder.
#[derive(Debug, Clone)]
pub struct GraphBatch<B: Backend> {
    pub nodes:             Tensor<B, 2>,
    pub adjacency:         Tensor<B, 2>,
    pub masked_atom_index: Tensor<B, 1, Int>,
    pub masked_atom_type:  Tensor<B, 1, Int>,
    pub num_graphs:        usize,
}

#[derive(Clone, Debug, Default)]
pub struct GraphBatcher;

impl GraphBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, MaskedGraphSample, GraphBatch<B>> for GraphBatcher {
    fn batch(&self, items: Vec<MaskedGraphSample>, device: &B::Device) -> GraphBatch<B> {
        let num_graphs = items.len();
        let feat_dim   = items.first().map(|s| s.feat_dim).unwrap_or(0);
        let total: usize = items.iter().map(|s| s.num_nodes).sum();

        let mut nodes     = Vec::with_capacity(total * feat_dim);
        let mut adjacency = vec![0.0f32; total * total];
        let mut masked_index: Vec<i32> = Vec::new();
        let mut masked_type:  Vec<i32> = Vec::new();

        let mut offset = 0usize;
        for sample in &items {
            let n = sample.num_nodes;
            nodes.extend_from_slice(&sample.node_features);

            // Copy this molecule's block onto the diagonal
            for r in 0..n {
                let dst = (offset + r) * total + offset;
                adjacency[dst..dst + n].copy_from_slice(&sample.adjacency[r * n..(r + 1) * n]);
            }

            masked_index.extend(sample.masked_atom_index.iter().map(|&i| (i + offset) as i32));
            masked_type.extend(sample.masked_atom_type.iter().map(|&t| t as i32));
            offset += n;
        }

        let nodes     = Tensor::<B, 2>::from_data(TensorData::new(nodes, [total, feat_dim]), device);
        let adjacency = Tensor::<B, 2>::from_data(TensorData::new(adjacency, [total, total]), device);
        let masked_atom_index = Tensor::<B, 1, Int>::from_ints(masked_index.as_slice(), device);
        let masked_atom_type  = Tensor::<B, 1, Int>::from_ints(masked_type.as_slice(), device);

        GraphBatch { nodes, adjacency, masked_atom_index, masked_atom_type, num_graphs }
    }
}
