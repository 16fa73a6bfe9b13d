//! Numeric payload types: indices, vectors, matrices, flip flags, and
//! uncertainty distributions.
//!
//! A resource group persists each member as one of the [`ArrayData`]
//! variants. All variants share a leading dimension (row count); the group
//! invariant that every member has the same row count is enforced at the
//! package layer.

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// One row of an indices array: a (row, col) pair of integer references.
///
/// The integers reference entities in some producer-local id space; they
/// carry no meaning until reconciled against a destination's id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexPair {
    pub row: i32,
    pub col: i32,
}

impl IndexPair {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Dense row-major 2-D array of `f64` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    values: Vec<f64>,
}

impl Matrix {
    /// Create a matrix, validating that the buffer matches the dimensions.
    pub fn new(nrows: usize, ncols: usize, values: Vec<f64>) -> TypeResult<Self> {
        if values.len() != nrows * ncols {
            return Err(TypeError::MatrixShape {
                nrows,
                ncols,
                len: values.len(),
            });
        }
        Ok(Self {
            nrows,
            ncols,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Borrow row `i` as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `i >= nrows`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Mutable access to row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.values[i * self.ncols..(i + 1) * self.ncols]
    }

    /// All values, row-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// New matrix keeping only the rows where `mask` is true.
    pub fn filter_rows(&self, mask: &[bool]) -> Self {
        let values: Vec<f64> = (0..self.nrows)
            .filter(|&i| mask[i])
            .flat_map(|i| self.row(i).iter().copied())
            .collect();
        let nrows = values.len() / self.ncols.max(1);
        Self {
            nrows,
            ncols: self.ncols,
            values,
        }
    }
}

/// One row of uncertainty parameters.
///
/// `uncertainty_type` is the distribution discriminator: `0` (unknown) and
/// `1` (no uncertainty, fixed value) both mean "no stated uncertainty";
/// values `>= 2` select a real distribution whose parameters are carried in
/// the remaining fields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub uncertainty_type: u8,
    pub loc: f32,
    pub scale: f32,
    pub shape: f32,
    pub minimum: f32,
    pub maximum: f32,
    pub negative: bool,
}

impl Distribution {
    /// A row carrying no stated uncertainty.
    pub fn undefined() -> Self {
        Self {
            uncertainty_type: 0,
            loc: f32::NAN,
            scale: f32::NAN,
            shape: f32::NAN,
            minimum: f32::NAN,
            maximum: f32::NAN,
            negative: false,
        }
    }

    /// Whether this row states a real uncertainty distribution.
    pub fn is_stated(&self) -> bool {
        self.uncertainty_type >= 2
    }
}

impl Default for Distribution {
    fn default() -> Self {
        Self::undefined()
    }
}

/// A serializable numeric payload: one member of a resource group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    /// Integer reference pairs (mandatory group member).
    Indices(Vec<IndexPair>),
    /// 1-D values for a persistent vector.
    Vector(Vec<f64>),
    /// 2-D values for a persistent array.
    Array(Matrix),
    /// Per-row sign-flip flags.
    Flip(Vec<bool>),
    /// Per-row uncertainty parameters.
    Distributions(Vec<Distribution>),
}

impl ArrayData {
    /// Leading dimension (row count) of the payload.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Indices(v) => v.len(),
            ArrayData::Vector(v) => v.len(),
            ArrayData::Array(m) => m.nrows(),
            ArrayData::Flip(v) => v.len(),
            ArrayData::Distributions(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New payload keeping only the rows where `mask` is true.
    ///
    /// # Panics
    ///
    /// Panics if `mask` is shorter than the payload.
    pub fn filter_rows(&self, mask: &[bool]) -> Self {
        fn keep<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, &m)| m)
                .map(|(v, _)| v.clone())
                .collect()
        }
        match self {
            ArrayData::Indices(v) => ArrayData::Indices(keep(v, mask)),
            ArrayData::Vector(v) => ArrayData::Vector(keep(v, mask)),
            ArrayData::Array(m) => ArrayData::Array(m.filter_rows(mask)),
            ArrayData::Flip(v) => ArrayData::Flip(keep(v, mask)),
            ArrayData::Distributions(v) => ArrayData::Distributions(keep(v, mask)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_shape_is_validated() {
        assert!(Matrix::new(2, 3, vec![0.0; 6]).is_ok());
        let err = Matrix::new(2, 3, vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, TypeError::MatrixShape { len: 5, .. }));
    }

    #[test]
    fn matrix_row_access() {
        let m = Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m.row(0), &[1.0, 2.0]);
        assert_eq!(m.row(1), &[3.0, 4.0]);
    }

    #[test]
    fn matrix_filter_rows() {
        let m = Matrix::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let kept = m.filter_rows(&[true, false, true]);
        assert_eq!(kept.nrows(), 2);
        assert_eq!(kept.values(), &[1.0, 2.0, 5.0, 6.0]);
    }

    #[test]
    fn distribution_discriminator() {
        assert!(!Distribution::undefined().is_stated());
        let fixed = Distribution {
            uncertainty_type: 1,
            ..Distribution::undefined()
        };
        assert!(!fixed.is_stated());
        let normal = Distribution {
            uncertainty_type: 3,
            loc: 1.0,
            scale: 0.5,
            ..Distribution::undefined()
        };
        assert!(normal.is_stated());
    }

    #[test]
    fn array_data_filter_keeps_order() {
        let data = ArrayData::Indices(vec![
            IndexPair::new(1, 4),
            IndexPair::new(2, 5),
            IndexPair::new(3, 6),
        ]);
        let kept = data.filter_rows(&[true, false, true]);
        assert_eq!(
            kept,
            ArrayData::Indices(vec![IndexPair::new(1, 4), IndexPair::new(3, 6)])
        );
        assert_eq!(kept.len(), 2);
    }
}
