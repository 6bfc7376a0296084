/// Error returned when a value buffer does not fit the requested shape.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ShapeError {
    #[display("shape {shape:?} holds {expected} values, got {actual}")]
    Length {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[display("shape {shape:?} has more elements than fit in memory")]
    Overflow { shape: Vec<usize> },
}

/// Number of elements a tensor of `shape` holds.
fn element_count(shape: &[usize]) -> Result<usize, ShapeError> {
    shape
        .iter()
        .try_fold(1_usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| ShapeError::Overflow {
            shape: shape.to_vec(),
        })
}

/// Dense row-major buffer of trainable parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self, ShapeError> {
        let expected = element_count(&shape)?;
        if values.len() != expected {
            return Err(ShapeError::Length {
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self, ShapeError> {
        Self::from_fn(shape, |_| 0.0)
    }

    /// Builds a tensor by evaluating `f` at each flat index.
    pub fn from_fn<F>(shape: Vec<usize>, f: F) -> Result<Self, ShapeError>
    where
        F: FnMut(usize) -> f32,
    {
        let len = element_count(&shape)?;
        let values = (0..len).map(f).collect();
        Ok(Self { shape, values })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Mutable access to the values. The shape itself can never change.
    #[must_use]
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
