//! Feed-forward neural controllers evolved by `rexevo-training`.
//!
//! A [`Genome`] is an ordered list of [`Layer`]s plus the fitness of its last
//! evaluation. Its trainable parameters are exposed as a flat sequence of
//! [`Tensor`]s ([`Genome::tensors`]) in a fixed order, which is the unit the
//! genetic operators work on.
//!
//! # Architecture
//!
//! ```text
//! SensorFrame features [distance, width, height, speed]
//!     ↓ Genome::predict
//! Dense 4 → 4 (relu)
//!     ↓
//! Dense 4 → 3 (softmax)
//!     ↓
//! [p(DOWN), p(NORM), p(JUMP)]
//! ```
//!
//! Weights are `f32`. Kernels are Glorot-uniform initialized and biases start at
//! zero, so two freshly built controllers differ only in their kernels.
//!
//! # Persistence
//!
//! See [`schema`] for the JSON genome-set format.

pub mod genome;
pub mod layer;
pub mod schema;
pub mod tensor;

pub use self::{
    genome::{CONTROLLER_INPUTS, CONTROLLER_LAYERS, Genome, GenomeError, Topology},
    layer::{Activation, DenseLayer, Layer, LayerError, LayerSpec},
    schema::{GenomeRecord, LoadedGenomes, RecordError, WeightRecord, load_records, to_json},
    tensor::{ShapeError, Tensor},
};
