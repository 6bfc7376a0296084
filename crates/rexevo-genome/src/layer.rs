//! Network layers.
//!
//! Only fully connected layers exist today. [`Layer`] is still a tagged enum so
//! that persisted records and the genetic operators stay explicit about which
//! layer kind they handle.

use std::{fmt, iter};

use rand::Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::tensor::{ShapeError, Tensor};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[display("relu")]
    Relu,
    #[display("softmax")]
    Softmax,
}

impl Activation {
    /// Applies the activation in place.
    pub fn apply(self, values: &mut [f32]) {
        match self {
            Self::Relu => {
                for v in values {
                    *v = v.max(0.0);
                }
            }
            Self::Softmax => {
                let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for v in values.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                if sum > 0.0 {
                    for v in values {
                        *v /= sum;
                    }
                }
            }
        }
    }
}

/// Shape of one layer, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub units: usize,
    pub activation: Activation,
    pub use_bias: bool,
}

impl LayerSpec {
    #[must_use]
    pub const fn dense(units: usize, activation: Activation) -> Self {
        Self {
            units,
            activation,
            use_bias: true,
        }
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.units, self.activation)?;
        if !self.use_bias {
            write!(f, " (no bias)")?;
        }
        Ok(())
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From,
)]
pub enum LayerError {
    #[display("kernel must be 2-dimensional, got shape {_0:?}")]
    KernelRank(#[error(not(source))] Vec<usize>),
    #[display("bias must have shape [{units}], got {shape:?}")]
    BiasShape { units: usize, shape: Vec<usize> },
    #[display("layer of {inputs} inputs and {units} units has no parameters")]
    Empty { inputs: usize, units: usize },
    #[display("invalid parameter tensor: {_0}")]
    #[from]
    Tensor(ShapeError),
}

/// Fully connected layer: `activation(input · kernel + bias)`.
///
/// The kernel has shape `[inputs, units]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    kernel: Tensor,
    bias: Option<Tensor>,
    activation: Activation,
}

impl DenseLayer {
    pub fn new(
        kernel: Tensor,
        bias: Option<Tensor>,
        activation: Activation,
    ) -> Result<Self, LayerError> {
        let &[inputs, units] = kernel.shape() else {
            return Err(LayerError::KernelRank(kernel.shape().to_vec()));
        };
        if inputs == 0 || units == 0 {
            return Err(LayerError::Empty { inputs, units });
        }
        if let Some(bias) = &bias
            && bias.shape() != [units]
        {
            return Err(LayerError::BiasShape {
                units,
                shape: bias.shape().to_vec(),
            });
        }
        Ok(Self {
            kernel,
            bias,
            activation,
        })
    }

    /// Glorot-uniform kernel, zero bias.
    pub fn glorot<R>(rng: &mut R, inputs: usize, spec: LayerSpec) -> Result<Self, LayerError>
    where
        R: Rng + ?Sized,
    {
        let units = spec.units;
        if inputs == 0 || units == 0 {
            return Err(LayerError::Empty { inputs, units });
        }
        #[expect(clippy::cast_precision_loss)]
        let limit = (6.0 / inputs.saturating_add(units) as f32).sqrt();
        let dist =
            Uniform::new_inclusive(-limit, limit).map_err(|_| LayerError::Empty { inputs, units })?;
        let kernel = Tensor::from_fn(vec![inputs, units], |_| rng.sample(dist))?;
        let bias = spec
            .use_bias
            .then(|| Tensor::zeros(vec![units]))
            .transpose()?;
        Self::new(kernel, bias, spec.activation)
    }

    #[must_use]
    pub fn inputs(&self) -> usize {
        self.kernel.shape()[0]
    }

    #[must_use]
    pub fn units(&self) -> usize {
        self.kernel.shape()[1]
    }

    #[must_use]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[must_use]
    pub fn kernel(&self) -> &Tensor {
        &self.kernel
    }

    #[must_use]
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    /// `input.len()` must equal [`Self::inputs`].
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let units = self.units();
        let mut output = match &self.bias {
            Some(bias) => bias.values().to_vec(),
            None => vec![0.0; units],
        };
        for (x, row) in input.iter().zip(self.kernel.values().chunks_exact(units)) {
            for (out, w) in output.iter_mut().zip(row) {
                *out += x * w;
            }
        }
        self.activation.apply(&mut output);
        output
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::From)]
pub enum Layer {
    Dense(DenseLayer),
}

impl Layer {
    #[must_use]
    pub fn inputs(&self) -> usize {
        match self {
            Self::Dense(dense) => dense.inputs(),
        }
    }

    #[must_use]
    pub fn units(&self) -> usize {
        match self {
            Self::Dense(dense) => dense.units(),
        }
    }

    #[must_use]
    pub fn spec(&self) -> LayerSpec {
        match self {
            Self::Dense(dense) => LayerSpec {
                units: dense.units(),
                activation: dense.activation,
                use_bias: dense.bias.is_some(),
            },
        }
    }

    pub(crate) fn forward(&self, input: &[f32]) -> Vec<f32> {
        match self {
            Self::Dense(dense) => dense.forward(input),
        }
    }

    /// Trainable tensors: kernel, then bias when present.
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        match self {
            Self::Dense(dense) => iter::once(&dense.kernel).chain(dense.bias.as_ref()),
        }
    }

    pub fn tensors_mut(&mut self) -> impl Iterator<Item = &mut Tensor> {
        match self {
            Self::Dense(dense) => iter::once(&mut dense.kernel).chain(dense.bias.as_mut()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let mut values = [1.0, 2.0, 3.0];
        Activation::Softmax.apply(&mut values);
        let sum: f32 = values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(values[0] < values[1] && values[1] < values[2]);

        // large logits must not overflow
        let mut values = [1000.0, 1000.0];
        Activation::Softmax.apply(&mut values);
        assert_eq!(values, [0.5, 0.5]);
    }

    #[test]
    fn test_relu_clamps_negatives() {
        let mut values = [-1.0, 0.0, 2.5];
        Activation::Relu.apply(&mut values);
        assert_eq!(values, [0.0, 0.0, 2.5]);
    }

    #[test]
    fn test_dense_forward() {
        let kernel = Tensor::new(vec![2, 2], vec![1.0, -1.0, 2.0, 0.5]).unwrap();
        let bias = Tensor::new(vec![2], vec![0.5, 0.0]).unwrap();
        let layer = DenseLayer::new(kernel, Some(bias), Activation::Relu).unwrap();
        // [1, 2] · [[1, -1], [2, 0.5]] + [0.5, 0] = [5.5, 0]
        assert_eq!(layer.forward(&[1.0, 2.0]), [5.5, 0.0]);
    }

    #[test]
    fn test_dense_rejects_bad_shapes() {
        let kernel = Tensor::zeros(vec![4]).unwrap();
        assert!(matches!(
            DenseLayer::new(kernel, None, Activation::Relu),
            Err(LayerError::KernelRank(_))
        ));

        let kernel = Tensor::zeros(vec![4, 3]).unwrap();
        let bias = Tensor::zeros(vec![4]).unwrap();
        assert_eq!(
            DenseLayer::new(kernel, Some(bias), Activation::Relu),
            Err(LayerError::BiasShape {
                units: 3,
                shape: vec![4]
            })
        );
    }

    #[test]
    fn test_glorot_within_limit() {
        let mut rng = Pcg64::seed_from_u64(7);
        let layer =
            DenseLayer::glorot(&mut rng, 4, LayerSpec::dense(3, Activation::Softmax)).unwrap();
        let limit = (6.0f32 / 7.0).sqrt();
        assert!(layer.kernel().values().iter().all(|w| w.abs() <= limit));
        assert!(layer.bias().unwrap().values().iter().all(|b| *b == 0.0));

        let layer = Layer::from(layer);
        assert_eq!(layer.tensors().count(), 2);
    }
}
