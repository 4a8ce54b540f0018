// ============================================================
// Layer 5 — Graph Encoder and Atom-Type Classifier
// ============================================================
// Architecture for one batch of stacked molecules:
//
//   nodes [n, input_dim]
//       │
//       ▼
//   input_proj + ReLU                      → h [n, hidden_dim]
//       │
//       ▼
//   num_layers × ( h + Dropout(ReLU(W · Â h)) )
//       │                                    Â = D^-½ (A + I) D^-½
//       ▼
//   output_proj                            → [n, output_dim]
//       │
//       ▼
//   concat with raw nodes                  → [n, output_dim + input_dim]
//       │
//       ▼ (masked rows only)
//   AtomTypeClassifier                     → logits [m, num_atoms]
//
// The adjacency is block diagonal, so no message crosses from
// one molecule to another inside a batch.
//
// Reference: Kipf & Welling (2017) Graph Convolutional Networks
//            Burn Book §3 (Modules)

use burn::{
    nn::{
        Dropout, DropoutConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::data::batcher::GraphBatch;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize;
// deriving them again gives conflicting impls.
#[derive(Config, Debug)]
pub struct GraphEncoderConfig {
    /// Node feature width (one-hot types + mask token + optional extras)
    pub input_dim:  usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    #[config(default = 3)]
    pub num_layers: usize,
    #[config(default = 0.0)]
    pub dropout:    f64,
}

impl GraphEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GraphEncoder<B> {
        let input_proj = LinearConfig::new(self.input_dim, self.hidden_dim).init(device);
        let layers: Vec<Linear<B>> = (0..self.num_layers)
            .map(|_| LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device))
            .collect();
        let output_proj = LinearConfig::new(self.hidden_dim, self.output_dim).init(device);
        let dropout     = DropoutConfig::new(self.dropout).init();
        GraphEncoder { input_proj, layers, output_proj, dropout }
    }

    /// Width of the encoder output: learned embedding plus raw features.
    pub fn embedding_dim(&self) -> usize {
        self.output_dim + self.input_dim
    }
}

/// Residual graph-convolution encoder over a dense normalised adjacency.
#[derive(Module, Debug)]
pub struct GraphEncoder<B: Backend> {
    pub input_proj:  Linear<B>,
    pub layers:      Vec<Linear<B>>,
    pub output_proj: Linear<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> GraphEncoder<B> {
    /// nodes: [n, input_dim], adjacency: [n, n] → [n, output_dim + input_dim]
    pub fn forward(&self, nodes: Tensor<B, 2>, adjacency: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut h = relu(self.input_proj.forward(nodes.clone()));

        for layer in &self.layers {
            let msg = layer.forward(adjacency.clone().matmul(h.clone()));
            h = self.dropout.forward(relu(msg)) + h;
        }

        let embed = self.output_proj.forward(h);
        // The classifier also sees the (masked) input features of each node.
        Tensor::cat(vec![embed, nodes], 1)
    }
}

#[derive(Config, Debug)]
pub struct AtomTypeClassifierConfig {
    pub embedding_dim: usize,
    pub num_atoms:     usize,
}

impl AtomTypeClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AtomTypeClassifier<B> {
        AtomTypeClassifier {
            linear: LinearConfig::new(self.embedding_dim, self.num_atoms).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct AtomTypeClassifier<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> AtomTypeClassifier<B> {
    /// embeddings: [m, embedding_dim] → logits: [m, num_atoms]
    pub fn forward(&self, embeddings: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(embeddings)
    }
}

/// Encoder and classifier head, optimised together by one optimizer.
#[derive(Module, Debug)]
pub struct PretrainModel<B: Backend> {
    pub encoder:    GraphEncoder<B>,
    pub classifier: AtomTypeClassifier<B>,
}

impl<B: Backend> PretrainModel<B> {
    pub fn new(
        encoder_cfg: &GraphEncoderConfig,
        num_atoms:   usize,
        device:      &B::Device,
    ) -> Self {
        let encoder    = encoder_cfg.init(device);
        let classifier = AtomTypeClassifierConfig::new(encoder_cfg.embedding_dim(), num_atoms).init(device);
        Self { encoder, classifier }
    }

    /// Per-node embeddings for every node in the batch.
    pub fn encode(&self, batch: &GraphBatch<B>) -> Tensor<B, 2> {
        self.encoder.forward(batch.nodes.clone(), batch.adjacency.clone())
    }

    /// Atom-type logits for a set of node embeddings.
    pub fn classify(&self, embeddings: Tensor<B, 2>) -> Tensor<B, 2> {
        self.classifier.forward(embeddings)
    }

    /// Logits for the masked nodes only: [total_masked, num_atoms]
    pub fn forward_masked(&self, batch: &GraphBatch<B>) -> Tensor<B, 2> {
        let embed  = self.encode(batch);
        let masked = embed.select(0, batch.masked_atom_index.clone());
        self.classify(masked)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;
    use burn::nn::loss::CrossEntropyLossConfig;

    use crate::data::batcher::GraphBatcher;
    use crate::data::dataset::PreparedGraph;
    use crate::data::transform::{FeatureConfig, MaskAtomType};
    use crate::domain::molecule::MolecularGraph;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = Autodiff<NdArray<f32>>;

    const NUM_ATOMS: usize = 5;

    fn tiny_batch(device: &<TestBackend as Backend>::Device) -> GraphBatch<TestBackend> {
        let features = FeatureConfig::new(NUM_ATOMS, true, true);
        let mask = MaskAtomType::new(0.4, None);
        let mut rng = StdRng::seed_from_u64(5);
        let samples = vec![
            MolecularGraph::new(vec![0, 1, 2, 1], vec![[0, 1], [1, 2], [2, 3], [3, 0]]),
            MolecularGraph::new(vec![3, 4, 0], vec![[0, 1], [1, 2]]),
        ]
        .into_iter()
        .map(|m| mask.apply(&PreparedGraph::new(m), &features, &mut rng))
        .collect();
        GraphBatcher::new().batch(samples, device)
    }

    fn tiny_model(device: &<TestBackend as Backend>::Device) -> PretrainModel<TestBackend> {
        let input_dim = FeatureConfig::new(NUM_ATOMS, true, true).dim();
        let cfg = GraphEncoderConfig::new(input_dim, 16, 8).with_num_layers(2);
        PretrainModel::new(&cfg, NUM_ATOMS, device)
    }

    #[test]
    fn test_output_shapes() {
        let device = Default::default();
        let batch = tiny_batch(&device);
        let model = tiny_model(&device);

        let embed = model.encode(&batch);
        assert_eq!(embed.dims(), [7, 8 + NUM_ATOMS + 3]);

        let masked = batch.masked_atom_index.dims()[0];
        let logits = model.forward_masked(&batch);
        assert_eq!(logits.dims(), [masked, NUM_ATOMS]);
    }

    #[test]
    fn test_backward_reaches_every_layer() {
        let device = Default::default();
        let batch = tiny_batch(&device);
        let model = tiny_model(&device);

        let logits = model.forward_masked(&batch);
        let loss = CrossEntropyLossConfig::new()
            .init(&device)
            .forward(logits, batch.masked_atom_type.clone());
        let grads = loss.backward();

        let linears = [
            &model.encoder.input_proj,
            &model.encoder.output_proj,
            &model.classifier.linear,
        ]
        .into_iter()
        .chain(model.encoder.layers.iter());

        for (i, linear) in linears.enumerate() {
            let w = linear.weight.grad(&grads).expect("weight has a gradient");
            let norm: f32 = w.abs().sum().into_scalar().elem();
            assert!(norm > 0.0, "zero weight gradient in linear #{i}");

            let bias = linear.bias.as_ref().expect("linear layers carry a bias");
            let b = bias.grad(&grads).expect("bias has a gradient");
            let norm: f32 = b.abs().sum().into_scalar().elem();
            assert!(norm > 0.0, "zero bias gradient in linear #{i}");
        }
    }
}
