use std::fmt;

use rand::Rng;

use crate::{
    layer::{Activation, DenseLayer, Layer, LayerError, LayerSpec},
    tensor::Tensor,
};

/// Input width of the game controller: `[distance, obstacle_width, obstacle_height, speed]`.
pub const CONTROLLER_INPUTS: usize = 4;

/// Hidden and output layers of the game controller. Outputs are `[DOWN, NORM, JUMP]`.
pub const CONTROLLER_LAYERS: [LayerSpec; 2] = [
    LayerSpec::dense(4, Activation::Relu),
    LayerSpec::dense(3, Activation::Softmax),
];

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum GenomeError {
    #[display("genome has no layers")]
    Empty,
    #[display("layer {index} expects {expected} inputs, previous layer produces {actual}")]
    Chain {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[display("layer {index}: {source}")]
    Layer { index: usize, source: LayerError },
    #[display("network expects {expected} inputs, got {actual}")]
    InputWidth { expected: usize, actual: usize },
}

/// Layer shapes of a genome, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub inputs: usize,
    pub layers: Vec<LayerSpec>,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inputs)?;
        for layer in &self.layers {
            write!(f, " -> {layer}")?;
        }
        Ok(())
    }
}

/// One candidate controller: a feed-forward network and its last fitness.
///
/// Cloning copies the parameter storage; a clone never aliases its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    layers: Vec<Layer>,
    fitness: Option<f64>,
}

impl Genome {
    /// Builds a genome from layers, checking that each layer consumes the
    /// previous layer's output width.
    pub fn new(layers: Vec<Layer>) -> Result<Self, GenomeError> {
        if layers.is_empty() {
            return Err(GenomeError::Empty);
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[1].inputs() != pair[0].units() {
                return Err(GenomeError::Chain {
                    index: index + 1,
                    expected: pair[1].inputs(),
                    actual: pair[0].units(),
                });
            }
        }
        Ok(Self {
            layers,
            fitness: None,
        })
    }

    /// Builds a freshly initialized network.
    ///
    /// # Arguments
    ///
    /// * `rng` - Random number generator for the Glorot-uniform kernels
    /// * `inputs` - Width of the input vector
    /// * `specs` - Layers from first hidden layer to output layer
    pub fn random<R>(rng: &mut R, inputs: usize, specs: &[LayerSpec]) -> Result<Self, GenomeError>
    where
        R: Rng + ?Sized,
    {
        let mut width = inputs;
        let mut layers = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let dense = DenseLayer::glorot(rng, width, *spec)
                .map_err(|source| GenomeError::Layer { index, source })?;
            width = dense.units();
            layers.push(Layer::Dense(dense));
        }
        Self::new(layers)
    }

    /// Builds the game controller network: 4 inputs, 4 relu units, 3 softmax outputs.
    pub fn controller<R>(rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        Self::random(rng, CONTROLLER_INPUTS, &CONTROLLER_LAYERS)
            .expect("controller topology is non-empty and chained")
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[must_use]
    pub fn inputs(&self) -> usize {
        self.layers[0].inputs()
    }

    #[must_use]
    pub fn outputs(&self) -> usize {
        self.layers[self.layers.len() - 1].units()
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        Topology {
            inputs: self.inputs(),
            layers: self.layers.iter().map(Layer::spec).collect(),
        }
    }

    /// Fitness from the last evaluation, `None` if not evaluated since creation.
    #[must_use]
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: Option<f64>) {
        self.fitness = fitness;
    }

    /// All trainable tensors in layer order, kernel before bias.
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.layers.iter().flat_map(Layer::tensors)
    }

    pub fn tensors_mut(&mut self) -> impl Iterator<Item = &mut Tensor> {
        self.layers.iter_mut().flat_map(Layer::tensors_mut)
    }

    /// Runs the forward pass.
    pub fn predict(&self, input: &[f32]) -> Result<Vec<f32>, GenomeError> {
        if input.len() != self.inputs() {
            return Err(GenomeError::InputWidth {
                expected: self.inputs(),
                actual: input.len(),
            });
        }
        let mut values = input.to_vec();
        for layer in &self.layers {
            values = layer.forward(&values);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_controller_shape() {
        let mut rng = Pcg64::seed_from_u64(1);
        let genome = Genome::controller(&mut rng);
        assert_eq!(genome.inputs(), 4);
        assert_eq!(genome.outputs(), 3);
        assert_eq!(genome.fitness(), None);
        assert_eq!(genome.topology().to_string(), "4 -> 4 relu -> 3 softmax");

        let shapes: Vec<_> = genome.tensors().map(|t| t.shape().to_vec()).collect();
        assert_eq!(shapes, [vec![4, 4], vec![4], vec![4, 3], vec![3]]);
    }

    #[test]
    fn test_predict_is_a_distribution() {
        let mut rng = Pcg64::seed_from_u64(2);
        let genome = Genome::controller(&mut rng);
        let output = genome.predict(&[0.3, 0.5, 0.0, 1.0]).unwrap();
        assert_eq!(output.len(), 3);
        let sum: f32 = output.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(output.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let mut rng = Pcg64::seed_from_u64(3);
        let genome = Genome::controller(&mut rng);
        assert_eq!(
            genome.predict(&[0.0; 3]),
            Err(GenomeError::InputWidth {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_clone_does_not_share_weights() {
        let mut rng = Pcg64::seed_from_u64(4);
        let original = Genome::controller(&mut rng);
        let mut copy = original.clone();
        for tensor in copy.tensors_mut() {
            for v in tensor.values_mut() {
                *v += 1.0;
            }
        }
        for (a, b) in original.tensors().zip(copy.tensors()) {
            assert!(a.values().iter().zip(b.values()).all(|(x, y)| x != y));
        }
    }

    #[test]
    fn test_new_rejects_unchained_layers() {
        let mut rng = Pcg64::seed_from_u64(5);
        let first = DenseLayer::glorot(&mut rng, 4, LayerSpec::dense(4, Activation::Relu)).unwrap();
        let second =
            DenseLayer::glorot(&mut rng, 5, LayerSpec::dense(3, Activation::Softmax)).unwrap();
        assert_eq!(
            Genome::new(vec![first.into(), second.into()]),
            Err(GenomeError::Chain {
                index: 1,
                expected: 5,
                actual: 4
            })
        );
        assert_eq!(Genome::new(vec![]), Err(GenomeError::Empty));
    }

    #[test]
    fn test_random_reports_bad_layer() {
        let mut rng = Pcg64::seed_from_u64(6);
        let specs = [LayerSpec::dense(0, Activation::Relu)];
        assert!(matches!(
            Genome::random(&mut rng, 4, &specs),
            Err(GenomeError::Layer { index: 0, .. })
        ));
    }
}
