// ============================================================
// Layer 5 — Emotion Classifier Model
// ============================================================
// A BERT-style encoder with a sentence classification head:
//
//   input_ids [b, s] ──► word + position + token-type embeddings
//                        LayerNorm, dropout
//                    ──► N × EncoderBlock (post-norm)
//                          self-attention (pad positions masked)
//                          Add & Norm
//                          Linear → GELU → Linear
//                          Add & Norm
//                    ──► pooler: tanh(Linear(h[:, 0]))   ([CLS] slot)
//                    ──► dropout → Linear → logits [b, num_labels]
//
// Field names mirror the parameter layout of pretrained BERT
// checkpoints so `infra::pretrained` can map weights 1:1 onto
// `TextEncoder`. The head is always initialised fresh.
//
// Reference: Devlin et al. (2019) BERT
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:              usize,
    pub hidden_size:             usize,
    pub num_layers:              usize,
    pub num_heads:               usize,
    pub intermediate_size:       usize,
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size:         usize,
    #[config(default = 0.1)]
    pub dropout:                 f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps:          f64,
}

#[derive(Config, Debug)]
pub struct EmotionClassifierConfig {
    pub encoder:    EncoderConfig,
    pub num_labels: usize,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TextEncoder<B> {
        let layers = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        TextEncoder {
            embeddings: self.build_embeddings(device),
            layers,
            pooler: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
        }
    }

    fn norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn build_embeddings<B: Backend>(&self, device: &B::Device) -> Embeddings<B> {
        Embeddings {
            word:       EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position:   EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device),
            token_type: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device),
            norm:       self.norm(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let attention = MultiHeadAttentionConfig::new(self.hidden_size, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        EncoderBlock {
            attention,
            attention_norm: self.norm(device),
            intermediate:   LinearConfig::new(self.hidden_size, self.intermediate_size).init(device),
            output:         LinearConfig::new(self.intermediate_size, self.hidden_size).init(device),
            output_norm:    self.norm(device),
            dropout:        DropoutConfig::new(self.dropout).init(),
        }
    }
}

impl EmotionClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmotionClassifier<B> {
        EmotionClassifier {
            encoder:    self.encoder.init(device),
            dropout:    DropoutConfig::new(self.encoder.dropout).init(),
            classifier: LinearConfig::new(self.encoder.hidden_size, self.num_labels).init(device),
        }
    }
}

// ─── Embeddings ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Embeddings<B: Backend> {
    pub word:       Embedding<B>,
    pub position:   Embedding<B>,
    pub token_type: Embedding<B>,
    pub norm:       LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> Embeddings<B> {
    /// [batch, seq_len] → [batch, seq_len, hidden]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        // Single-sentence inputs: every token is segment 0.
        let segments = Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device);

        let x = self.word.forward(input_ids)
            + self.position.forward(positions)
            + self.token_type.forward(segments);
        self.dropout.forward(self.norm.forward(x))
    }
}

// ─── EncoderBlock ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub attention:      MultiHeadAttention<B>,
    pub attention_norm: LayerNorm<B>,
    pub intermediate:   Linear<B>,
    pub output:         Linear<B>,
    pub output_norm:    LayerNorm<B>,
    pub dropout:        Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self
            .attention
            .forward(MhaInput::self_attn(x.clone()).mask_pad(mask_pad))
            .context;
        let x = self.attention_norm.forward(x + self.dropout.forward(attn));

        let ffn = self.output.forward(activation::gelu(self.intermediate.forward(x.clone())));
        self.output_norm.forward(x + self.dropout.forward(ffn))
    }
}

// ─── TextEncoder ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TextEncoder<B: Backend> {
    pub embeddings: Embeddings<B>,
    pub layers:     Vec<EncoderBlock<B>>,
    pub pooler:     Linear<B>,
}

impl<B: Backend> TextEncoder<B> {
    /// Returns the pooled [CLS] representation, [batch, hidden].
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let mask_pad = attention_mask.equal_elem(0);

        let mut x = self.embeddings.forward(input_ids);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }

        let [batch_size, _, hidden] = x.dims();
        let cls = x.slice([0..batch_size, 0..1, 0..hidden]).reshape([batch_size, hidden]);
        activation::tanh(self.pooler.forward(cls))
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

// ─── EmotionClassifier ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EmotionClassifier<B: Backend> {
    pub encoder:    TextEncoder<B>,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
}

pub struct ClassifierOutput<B: Backend> {
    /// [batch, num_labels]
    pub logits: Tensor<B, 2>,
    /// Mean cross-entropy; present when labels were supplied
    pub loss:   Option<Tensor<B, 1>>,
}

impl<B: Backend> EmotionClassifier<B> {
    /// Swap in a (pretrained) encoder, keeping the fresh head.
    pub fn with_encoder(mut self, encoder: TextEncoder<B>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        labels:         Option<Tensor<B, 1, Int>>,
    ) -> ClassifierOutput<B> {
        let logits = self.logits(input_ids, attention_mask);
        let loss = labels.map(|labels| cross_entropy(logits.clone(), labels));
        ClassifierOutput { logits, loss }
    }

    /// Forward pass with labels: (mean loss [1], logits [batch, num_labels]).
    pub fn forward_loss(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        labels:         Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.logits(input_ids, attention_mask);
        (cross_entropy(logits.clone(), labels), logits)
    }

    fn logits(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let pooled = self.encoder.forward(input_ids, attention_mask);
        self.classifier.forward(self.dropout.forward(pooled))
    }
}

fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    pub(crate) fn tiny_config(num_labels: usize) -> EmotionClassifierConfig {
        EmotionClassifierConfig::new(EncoderConfig::new(32, 8, 2, 2, 16, 16), num_labels)
    }

    fn inputs(device: &<NdArray as Backend>::Device) -> (Tensor<NdArray, 2, Int>, Tensor<NdArray, 2, Int>) {
        let ids = Tensor::from_data(TensorData::new(vec![1i64, 5, 6, 7, 2, 0, 1, 8, 9, 2, 0, 0], [2, 6]), device);
        let mask = Tensor::from_data(TensorData::new(vec![1i64, 1, 1, 1, 1, 0, 1, 1, 1, 1, 0, 0], [2, 6]), device);
        (ids, mask)
    }

    #[test]
    fn test_logits_shape_without_labels() {
        let device = Default::default();
        let model = tiny_config(7).init::<NdArray>(&device);
        let (ids, mask) = inputs(&device);

        let out = model.forward(ids, mask, None);
        assert_eq!(out.logits.dims(), [2, 7]);
        assert!(out.loss.is_none());
    }

    #[test]
    fn test_loss_is_finite_scalar_with_labels() {
        let device = Default::default();
        let model = tiny_config(2).init::<NdArray>(&device);
        let (ids, mask) = inputs(&device);
        let labels = Tensor::from_data(TensorData::new(vec![0i64, 1], [2]), &device);

        let out = model.forward(ids, mask, Some(labels));
        let loss = out.loss.unwrap();
        assert_eq!(loss.dims(), [1]);
        let value: f64 = loss.into_scalar().elem();
        assert!(value.is_finite() && value > 0.0);
    }

    #[test]
    fn test_encoder_layer_count() {
        let device = Default::default();
        let model = tiny_config(2).init::<NdArray>(&device);
        assert_eq!(model.encoder.num_layers(), 2);
    }
}
