//! Shared data model: pairwise comparison matrix, indicator matrix,
//! indicator → category mapping and weight-vector normalization.
//!
//! All matrices are dense `nalgebra::DMatrix<f64>`; problem sizes are tens of
//! entities by at most a few dozen indicators.

use nalgebra::DMatrix;

use crate::error::{ensure_finite, McdaError};

/// Allowed deviation from `a_ij * a_ji == 1` and from a unit diagonal.
/// Expert matrices are usually entered as decimals (0.333…), so exact
/// reciprocity is never available.
pub const RECIPROCITY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------
//  Pairwise comparison matrix
// ---------------------------------------------------------------------

/// Square, positive, reciprocal matrix of expert judgments.
///
/// Entry `(i, j)` is the importance of criterion `i` relative to `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseMatrix {
    values: DMatrix<f64>,
}

impl PairwiseMatrix {
    pub fn new(values: DMatrix<f64>) -> Result<Self, McdaError> {
        let (rows, cols) = values.shape();
        if rows == 0 {
            return Err(McdaError::Empty {
                context: "pairwise matrix",
            });
        }
        if rows != cols {
            return Err(McdaError::NotSquare {
                context: "pairwise matrix",
                rows,
                cols,
            });
        }

        for row in 0..rows {
            for col in 0..cols {
                let value = values[(row, col)];
                if !value.is_finite() || value <= 0.0 {
                    return Err(McdaError::InvalidPairwiseEntry { row, col, value });
                }
            }
        }

        for i in 0..rows {
            let diag = values[(i, i)];
            if (diag - 1.0).abs() > RECIPROCITY_TOLERANCE {
                return Err(McdaError::InvalidPairwiseEntry {
                    row: i,
                    col: i,
                    value: diag,
                });
            }
            for j in (i + 1)..rows {
                let forward = values[(i, j)];
                let backward = values[(j, i)];
                if (forward * backward - 1.0).abs() > RECIPROCITY_TOLERANCE {
                    return Err(McdaError::NonReciprocal {
                        row: i,
                        col: j,
                        forward,
                        backward,
                    });
                }
            }
        }

        Ok(Self { values })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, McdaError> {
        Self::new(dense_from_rows("pairwise matrix", rows)?)
    }

    /// Build the full reciprocal matrix from the judgments above the diagonal,
    /// listed row by row: `(0,1), (0,2), …, (1,2), …`.
    pub fn from_upper_triangle(order: usize, upper: &[f64]) -> Result<Self, McdaError> {
        if order == 0 {
            return Err(McdaError::Empty {
                context: "pairwise matrix",
            });
        }
        let expected = order * (order - 1) / 2;
        if upper.len() != expected {
            return Err(McdaError::dimension("pairwise upper triangle", expected, upper.len()));
        }

        let mut values = DMatrix::from_element(order, order, 1.0);
        let mut k = 0;
        for i in 0..order {
            for j in (i + 1)..order {
                let value = upper[k];
                k += 1;
                if !value.is_finite() || value <= 0.0 {
                    return Err(McdaError::InvalidPairwiseEntry {
                        row: i,
                        col: j,
                        value,
                    });
                }
                values[(i, j)] = value;
                values[(j, i)] = 1.0 / value;
            }
        }
        Self::new(values)
    }

    pub fn order(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }
}

// ---------------------------------------------------------------------
//  Indicator matrix
// ---------------------------------------------------------------------

/// Entities × indicators matrix. Rows are entities, columns indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorMatrix {
    values: DMatrix<f64>,
}

impl IndicatorMatrix {
    pub fn new(values: DMatrix<f64>) -> Result<Self, McdaError> {
        if values.nrows() == 0 || values.ncols() == 0 {
            return Err(McdaError::Empty {
                context: "indicator matrix",
            });
        }
        ensure_finite("indicator matrix", values.as_slice())?;
        Ok(Self { values })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, McdaError> {
        Self::new(dense_from_rows("indicator matrix", rows)?)
    }

    pub fn entities(&self) -> usize {
        self.values.nrows()
    }

    pub fn indicators(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn column(&self, indicator: usize) -> Vec<f64> {
        self.values.column(indicator).iter().copied().collect()
    }

    /// Scale every column to [0, 1] with `(x - min) / (max - min)`.
    ///
    /// A zero-range column is divided by 1 instead, so it becomes all zeros.
    pub fn min_max_normalized(&self) -> IndicatorMatrix {
        let mut out = self.values.clone();
        for col in 0..out.ncols() {
            let column = self.values.column(col);
            let min = column.iter().copied().fold(f64::INFINITY, f64::min);
            let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = if max - min == 0.0 { 1.0 } else { max - min };
            for row in 0..out.nrows() {
                out[(row, col)] = (self.values[(row, col)] - min) / range;
            }
        }
        IndicatorMatrix { values: out }
    }
}

// ---------------------------------------------------------------------
//  Indicator → category mapping
// ---------------------------------------------------------------------

/// Assignment of each secondary indicator column to exactly one top-level
/// criterion. Every criterion owns at least one indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapping {
    assignments: Vec<usize>,
    categories: usize,
}

impl CategoryMapping {
    pub fn new(assignments: Vec<usize>, categories: usize) -> Result<Self, McdaError> {
        if assignments.is_empty() {
            return Err(McdaError::Empty {
                context: "category mapping",
            });
        }
        if categories == 0 {
            return Err(McdaError::Empty {
                context: "category set",
            });
        }

        let mut counts = vec![0usize; categories];
        for (indicator, &category) in assignments.iter().enumerate() {
            if category >= categories {
                return Err(McdaError::CategoryOutOfRange {
                    indicator,
                    category,
                    categories,
                });
            }
            counts[category] += 1;
        }
        if let Some(category) = counts.iter().position(|&c| c == 0) {
            return Err(McdaError::EmptyCategory { category });
        }

        Ok(Self {
            assignments,
            categories,
        })
    }

    /// `per_category` consecutive indicators for each criterion:
    /// `[0, 0, 1, 1, …]` for `per_category = 2`.
    pub fn uniform(categories: usize, per_category: usize) -> Result<Self, McdaError> {
        let assignments = (0..categories)
            .flat_map(|c| std::iter::repeat(c).take(per_category))
            .collect();
        Self::new(assignments, categories)
    }

    /// Flat single-level case: indicator `j` is criterion `j`.
    pub fn identity(n: usize) -> Result<Self, McdaError> {
        Self::new((0..n).collect(), n)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn categories(&self) -> usize {
        self.categories
    }

    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn indicators_in(&self, category: usize) -> impl Iterator<Item = usize> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter(move |(_, c)| **c == category)
            .map(|(j, _)| j)
    }

    /// Give every indicator the weight of its category.
    pub fn expand(&self, top_level: &[f64]) -> Result<Vec<f64>, McdaError> {
        if top_level.len() != self.categories {
            return Err(McdaError::dimension(
                "top-level weights vs mapping categories",
                self.categories,
                top_level.len(),
            ));
        }
        Ok(self.assignments.iter().map(|&c| top_level[c]).collect())
    }
}

// ---------------------------------------------------------------------
//  Helpers
// ---------------------------------------------------------------------

/// Rescale a non-negative vector in place so it sums to one.
pub fn normalize_weights(values: &mut [f64], context: &'static str) -> Result<(), McdaError> {
    if values.is_empty() {
        return Err(McdaError::Empty { context });
    }
    ensure_finite(context, values)?;
    if let Some(value) = values.iter().copied().find(|v| *v < 0.0) {
        return Err(McdaError::NegativeValue { context, value });
    }
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return Err(McdaError::InvalidParameter {
            name: context,
            value: sum,
        });
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
    Ok(())
}

pub(crate) fn dense_from_rows(
    context: &'static str,
    rows: &[Vec<f64>],
) -> Result<DMatrix<f64>, McdaError> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.is_empty() || cols == 0 {
        return Err(McdaError::Empty { context });
    }
    if let Some(row) = rows.iter().find(|r| r.len() != cols) {
        return Err(McdaError::dimension(context, cols, row.len()));
    }
    Ok(DMatrix::from_fn(rows.len(), cols, |i, j| rows[i][j]))
}

pub(crate) fn matrix_rows(values: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..values.nrows())
        .map(|r| values.row(r).iter().copied().collect())
        .collect()
}
