// ============================================================
// Layer 5 — Trainable Parameter Set
// ============================================================
// Which decoder tensors the optimiser may touch.
//
// Built ONCE, before the first step, by walking the decoder's
// parameters with a ModuleVisitor:
//
//   trainable = float params that require grad
//               and are not a declared input slot
//   auxiliary = everything else the decoder carries
//
// The resulting ParamId list is handed to
// GradientsParams::from_params at every step, so the update
// is restricted to exactly this set. The frozen extractor is
// a separate module on the inner backend and never appears
// here at all.
//
// Reference: Burn Book §5 (Custom Training Loop)

use burn::{
    module::{ModuleVisitor, Param, ParamId},
    prelude::*,
};
use std::collections::BTreeMap;

/// One parameter of a module, addressed by its field path.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParam {
    /// e.g. "layers.0.input_gate.input_transform.weight"
    pub name:         String,
    pub id:           ParamId,
    pub shape:        Vec<usize>,
    pub require_grad: bool,
    pub float:        bool,
}

// ─── ParamCollector ───────────────────────────────────────────────────────────
#[derive(Default)]
struct ParamCollector {
    path:   Vec<String>,
    params: Vec<NamedParam>,
}

impl ParamCollector {
    fn push(&mut self, id: ParamId, shape: Vec<usize>, require_grad: bool, float: bool) {
        self.params.push(NamedParam {
            name: self.path.join("."),
            id,
            shape,
            require_grad,
            float,
        });
    }
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        let value = param.val();
        self.push(param.id, value.dims().to_vec(), value.is_require_grad(), true);
    }

    fn visit_int<const D: usize>(&mut self, param: &Param<Tensor<B, D, Int>>) {
        self.push(param.id, param.val().dims().to_vec(), false, false);
    }

    fn visit_bool<const D: usize>(&mut self, param: &Param<Tensor<B, D, Bool>>) {
        self.push(param.id, param.val().dims().to_vec(), false, false);
    }
}

/// Every parameter of `module`, in visiting order.
pub fn named_params<B: Backend, M: Module<B>>(module: &M) -> Vec<NamedParam> {
    let mut collector = ParamCollector::default();
    module.visit(&mut collector);
    collector.params
}

// ─── TrainableSet ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrainableSet {
    trainable: Vec<NamedParam>,
    auxiliary: Vec<NamedParam>,
    ids:       Vec<ParamId>,
}

impl TrainableSet {
    /// Split `module`'s parameters into trainable and auxiliary.
    /// A parameter whose root field is named after an input slot is
    /// never trainable.
    pub fn declare<B: Backend, M: Module<B>>(module: &M, input_slots: &[&str]) -> Self {
        let (trainable, auxiliary): (Vec<_>, Vec<_>) = named_params::<B, M>(module)
            .into_iter()
            .partition(|p| {
                let root = p.name.split('.').next().unwrap_or_default();
                p.float && p.require_grad && !input_slots.contains(&root)
            });
        let ids = trainable.iter().map(|p| p.id).collect();

        tracing::info!(
            "Trainable set: {} tensors ({} values), {} auxiliary",
            trainable.len(),
            trainable.iter().map(|p| p.shape.iter().product::<usize>()).sum::<usize>(),
            auxiliary.len()
        );
        Self { trainable, auxiliary, ids }
    }

    pub fn ids(&self) -> &[ParamId] { &self.ids }

    pub fn len(&self) -> usize { self.trainable.len() }

    pub fn is_empty(&self) -> bool { self.trainable.is_empty() }

    pub fn trainable_names(&self) -> Vec<String> {
        self.trainable.iter().map(|p| p.name.clone()).collect()
    }

    pub fn auxiliary_names(&self) -> Vec<String> {
        self.auxiliary.iter().map(|p| p.name.clone()).collect()
    }
}

// ─── ParamSnapshot ────────────────────────────────────────────────────────────
/// Values of every float parameter, keyed by name. Used to prove
/// which tensors an update did and did not touch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSnapshot(pub BTreeMap<String, TensorData>);

#[derive(Default)]
struct SnapshotVisitor {
    path:   Vec<String>,
    values: BTreeMap<String, TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for SnapshotVisitor {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn visit_float<const D: usize>(&mut self, param: &Param<Tensor<B, D>>) {
        self.values.insert(self.path.join("."), param.val().into_data());
    }
}

impl ParamSnapshot {
    pub fn capture<B: Backend, M: Module<B>>(module: &M) -> Self {
        let mut visitor = SnapshotVisitor::default();
        module.visit(&mut visitor);
        Self(visitor.values)
    }

    /// Names whose values differ between the two snapshots.
    pub fn changed(&self, other: &ParamSnapshot) -> Vec<String> {
        self.0
            .iter()
            .filter(|(name, data)| other.0.get(*name) != Some(*data))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
