//! Persistence schema for genome sets.
//!
//! A saved population is a JSON array of [`GenomeRecord`]s:
//!
//! ```json
//! [
//!   {
//!     "layers": [
//!       { "units": 4, "activation": "relu", "use_bias": true },
//!       { "units": 3, "activation": "softmax", "use_bias": true }
//!     ],
//!     "weights": [
//!       { "values": [...16 numbers...], "shape": [4, 4] },
//!       { "values": [...4 numbers...], "shape": [4] },
//!       { "values": [...12 numbers...], "shape": [4, 3] },
//!       { "values": [...3 numbers...], "shape": [3] }
//!     ],
//!     "fitness": 12.0
//!   }
//! ]
//! ```
//!
//! Weight entries follow layer order, kernel (`[inputs, units]`) before bias.
//! The input width is carried by the first kernel's shape.
//!
//! Records are decoded one at a time: [`load_records`] keeps every genome that
//! decodes and reports the rest, so a single corrupt entry does not discard a
//! whole checkpoint.

use serde::{Deserialize, Serialize};

use crate::{
    genome::{Genome, GenomeError},
    layer::{DenseLayer, Layer, LayerError, LayerSpec},
    tensor::{ShapeError, Tensor},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub values: Vec<f32>,
    pub shape: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub layers: Vec<LayerSpec>,
    pub weights: Vec<WeightRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum RecordError {
    #[display("malformed record: {_0}")]
    #[from]
    Parse(serde_json::Error),
    #[display("layer {layer} has no {tensor} weights")]
    MissingWeights { layer: usize, tensor: &'static str },
    #[display("layer {layer} declares {units} units but its kernel has shape {shape:?}")]
    Units {
        layer: usize,
        units: usize,
        shape: Vec<usize>,
    },
    #[display("{count} weight entries left after the last layer")]
    ExtraWeights { count: usize },
    #[display("invalid tensor: {_0}")]
    #[from]
    Tensor(ShapeError),
    #[display("invalid layer: {_0}")]
    #[from]
    Layer(LayerError),
    #[display("invalid genome: {_0}")]
    #[from]
    Genome(GenomeError),
}

/// Genomes decoded from a genome set.
#[derive(Debug, Default)]
pub struct LoadedGenomes {
    pub genomes: Vec<Genome>,
    /// Index of each skipped record and why it was skipped.
    pub errors: Vec<(usize, RecordError)>,
}

impl Genome {
    #[must_use]
    pub fn to_record(&self) -> GenomeRecord {
        GenomeRecord {
            layers: self.layers().iter().map(Layer::spec).collect(),
            weights: self
                .tensors()
                .map(|t| WeightRecord {
                    values: t.values().to_vec(),
                    shape: t.shape().to_vec(),
                })
                .collect(),
            fitness: self.fitness(),
        }
    }

    pub fn from_record(record: GenomeRecord) -> Result<Self, RecordError> {
        let mut weights = record.weights.into_iter();
        let mut layers = Vec::with_capacity(record.layers.len());
        for (index, spec) in record.layers.into_iter().enumerate() {
            let kernel = weights.next().ok_or(RecordError::MissingWeights {
                layer: index,
                tensor: "kernel",
            })?;
            let kernel = Tensor::new(kernel.shape, kernel.values)?;
            if kernel.shape().get(1) != Some(&spec.units) {
                return Err(RecordError::Units {
                    layer: index,
                    units: spec.units,
                    shape: kernel.shape().to_vec(),
                });
            }
            let bias = if spec.use_bias {
                let bias = weights.next().ok_or(RecordError::MissingWeights {
                    layer: index,
                    tensor: "bias",
                })?;
                Some(Tensor::new(bias.shape, bias.values)?)
            } else {
                None
            };
            layers.push(Layer::Dense(DenseLayer::new(kernel, bias, spec.activation)?));
        }
        let count = weights.len();
        if count > 0 {
            return Err(RecordError::ExtraWeights { count });
        }

        let mut genome = Self::new(layers)?;
        genome.set_fitness(record.fitness);
        Ok(genome)
    }
}

/// Encodes genomes as a pretty-printed JSON genome set.
pub fn to_json<'a, I>(genomes: I) -> serde_json::Result<String>
where
    I: IntoIterator<Item = &'a Genome>,
{
    let records: Vec<_> = genomes.into_iter().map(Genome::to_record).collect();
    serde_json::to_string_pretty(&records)
}

/// Decodes a JSON genome set with per-record isolation.
///
/// Fails only when `json` is not an array at all. Each skipped record is logged.
pub fn load_records(json: &str) -> serde_json::Result<LoadedGenomes> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut loaded = LoadedGenomes::default();
    for (index, value) in values.into_iter().enumerate() {
        let result = serde_json::from_value::<GenomeRecord>(value)
            .map_err(RecordError::from)
            .and_then(Genome::from_record);
        match result {
            Ok(genome) => loaded.genomes.push(genome),
            Err(err) => {
                tracing::warn!(record = index, "skipping genome record: {err}");
                loaded.errors.push((index, err));
            }
        }
    }
    Ok(loaded)
}
