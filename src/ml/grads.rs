// ============================================================
// Layer 5 — Gradient Utilities
// ============================================================
// Whole-model operations on a GradientsParams container, built
// on Burn's ModuleVisitor the same way GradientsAccumulator is:
// the visitor walks every float parameter of a module and looks
// its gradient up by ParamId.
//
//   global_norm         √(Σ ‖g‖²) over every parameter
//   clip_global_norm    unscale, then scale all grads by
//                       min(1, max_norm / (norm + 1e-6))
//   take_grads          move the grads of one submodule out
//   split_layerwise     head / layers / embeddings groups with
//                       learning-rate factors rate^k
//
// Gradients live on the inner (non-autodiff) backend.

use burn::{
    module::{AutodiffModule, Module, ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::ml::model::EmotionClassifier;

const CLIP_EPSILON: f64 = 1e-6;

// ─── Visitors ─────────────────────────────────────────────────────────────────
struct SquaredNorm<'a> {
    grads: &'a GradientsParams,
    sum:   f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.sum += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct ScaleGrads<'a> {
    grads:  &'a mut GradientsParams,
    factor: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for ScaleGrads<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads
                .register::<B::InnerBackend, D>(id, grad.mul_scalar(self.factor));
        }
    }
}

struct GradsExtractor<'a> {
    source: &'a mut GradientsParams,
    target: &'a mut GradientsParams,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradsExtractor<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.source.remove::<B::InnerBackend, D>(id) {
            self.target.register::<B::InnerBackend, D>(id, grad);
        }
    }
}

// ─── Norm and clipping ────────────────────────────────────────────────────────
/// L2 norm over every gradient of `module`.
pub fn global_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm { grads, sum: 0.0 };
    module.visit(&mut visitor);
    visitor.sum.sqrt()
}

/// Multiply every gradient of `module` by `factor`.
pub fn scale_grads<B, M>(module: &M, mut grads: GradientsParams, factor: f64) -> GradientsParams
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = ScaleGrads { grads: &mut grads, factor };
    module.visit(&mut visitor);
    grads
}

/// Remove the loss scale (`inv_scale`) and clip to `max_norm`.
///
/// Returns the clipped gradients with their unscaled, pre-clip
/// norm, or `None` when that norm is not finite (overflow).
pub fn clip_global_norm<B, M>(
    module:    &M,
    grads:     GradientsParams,
    inv_scale: f64,
    max_norm:  f64,
) -> Option<(GradientsParams, f64)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_norm(module, &grads) * inv_scale;
    if !norm.is_finite() {
        return None;
    }

    let clip_coef = (max_norm / (norm + CLIP_EPSILON)).min(1.0);
    let factor = inv_scale * clip_coef;
    if factor == 1.0 {
        return Some((grads, norm));
    }
    Some((scale_grads(module, grads, factor), norm))
}

// ─── Parameter groups ─────────────────────────────────────────────────────────
/// Gradients of one parameter group and its learning-rate factor.
pub struct ParamGroup {
    pub name:      String,
    pub lr_factor: f64,
    pub grads:     GradientsParams,
}

/// Move the gradients that belong to `submodule` out of `grads`.
pub fn take_grads<B, M>(submodule: &M, grads: &mut GradientsParams) -> GradientsParams
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let mut taken = GradientsParams::new();
    move_grads(submodule, grads, &mut taken);
    taken
}

fn move_grads<B, M>(submodule: &M, from: &mut GradientsParams, into: &mut GradientsParams)
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let mut visitor = GradsExtractor { source: from, target: into };
    submodule.visit(&mut visitor);
}

/// Learning-rate factors for a `num_layers`-deep encoder:
/// `[head, layer L-1, ..., layer 0, embeddings]`.
pub fn layerwise_factors(num_layers: usize, rate: f64) -> Vec<f64> {
    (0..=num_layers + 1).map(|k| rate.powi(k as i32)).collect()
}

/// Split a model's gradients into layer-wise decay groups.
///
/// Head (classifier + pooler) gets `rate^0`, encoder layer `i`
/// gets `rate^(L - i)`, the embeddings `rate^(L + 1)`.
pub fn split_layerwise<B: AutodiffBackend>(
    model: &EmotionClassifier<B>,
    mut grads: GradientsParams,
    rate: f64,
) -> Vec<ParamGroup> {
    let num_layers = model.encoder.num_layers();
    let factors = layerwise_factors(num_layers, rate);
    let mut groups = Vec::with_capacity(num_layers + 2);

    let mut head = take_grads(&model.classifier, &mut grads);
    move_grads(&model.encoder.pooler, &mut grads, &mut head);
    groups.push(ParamGroup { name: "head".into(), lr_factor: factors[0], grads: head });

    for (i, layer) in model.encoder.layers.iter().enumerate().rev() {
        groups.push(ParamGroup {
            name:      format!("layer {i}"),
            lr_factor: factors[num_layers - i],
            grads:     take_grads(layer, &mut grads),
        });
    }

    groups.push(ParamGroup {
        name:      "embeddings".into(),
        lr_factor: factors[num_layers + 1],
        grads:     take_grads(&model.encoder.embeddings, &mut grads),
    });

    if !grads.is_empty() {
        tracing::warn!("{} gradients matched no parameter group", grads.len());
    }
    groups
}
