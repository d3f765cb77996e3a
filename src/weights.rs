//! Combined subjective/objective weighting.
//!
//! - Subjective: AHP priorities from a pairwise comparison matrix via the
//!   row geometric mean, with Saaty's consistency ratio as an advisory check.
//! - Objective: entropy weights from the [0,1]-normalized indicator matrix.
//! - Combination: each indicator gets its category's AHP weight times its own
//!   entropy weight, renormalized to sum to one.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ensure_finite, McdaError};
use crate::matrix::{normalize_weights, CategoryMapping, IndicatorMatrix, PairwiseMatrix};

/// Saaty's random consistency index for matrix orders 1..=15.
pub const SAATY_RANDOM_INDEX: [f64; 15] = [
    0.0, 0.0, 0.58, 0.90, 1.12, 1.24, 1.32, 1.41, 1.45, 1.49, 1.51, 1.48, 1.56, 1.57, 1.59,
];

/// Conventional acceptance bound for the consistency ratio.
pub const DEFAULT_CONSISTENCY_THRESHOLD: f64 = 0.10;

// ---------------------------------------------------------------------
//  Config
// ---------------------------------------------------------------------

/// Random index lookup keyed by matrix order (entry `k` is order `k + 1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RandomIndexTable {
    values: Vec<f64>,
}

impl Default for RandomIndexTable {
    fn default() -> Self {
        Self {
            values: SAATY_RANDOM_INDEX.to_vec(),
        }
    }
}

impl RandomIndexTable {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, order: usize) -> Option<f64> {
        order
            .checked_sub(1)
            .and_then(|idx| self.values.get(idx).copied())
    }

    pub fn max_order(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Added inside `ln(p + eps)` so zero shares do not produce `ln(0)`.
    pub entropy_epsilon: f64,
    /// CR at or above this value marks the pairwise matrix for revision.
    pub consistency_threshold: f64,
    pub random_index: RandomIndexTable,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            entropy_epsilon: 1e-10,
            consistency_threshold: DEFAULT_CONSISTENCY_THRESHOLD,
            random_index: RandomIndexTable::default(),
        }
    }
}

// ---------------------------------------------------------------------
//  Results
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub order: usize,
    pub lambda_max: f64,
    pub consistency_index: f64,
    pub random_index: f64,
    pub consistency_ratio: f64,
    /// `consistency_ratio < threshold`. Advisory only.
    pub acceptable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedWeights {
    /// One weight per top-level criterion.
    pub ahp: Vec<f64>,
    /// One weight per indicator column.
    pub entropy: Vec<f64>,
    /// One weight per indicator column, sums to one.
    pub combined: Vec<f64>,
    pub consistency: ConsistencyReport,
}

// ---------------------------------------------------------------------
//  AHP
// ---------------------------------------------------------------------

/// Normalized row geometric means of a square positive matrix.
///
/// Works on any positive matrix, not only reciprocal ones; multiplying the
/// whole matrix by a constant leaves the result unchanged.
pub fn ahp_priority(matrix: &DMatrix<f64>) -> Result<Vec<f64>, McdaError> {
    let (rows, cols) = matrix.shape();
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

    let n = rows as f64;
    let mut priority = Vec::with_capacity(rows);
    for row in 0..rows {
        let mut log_sum = 0.0;
        for col in 0..cols {
            let value = matrix[(row, col)];
            if !value.is_finite() || value <= 0.0 {
                return Err(McdaError::InvalidPairwiseEntry { row, col, value });
            }
            log_sum += value.ln();
        }
        // n-th root of the row product, taken in log space.
        priority.push((log_sum / n).exp());
    }

    normalize_weights(&mut priority, "ahp priority")?;
    Ok(priority)
}

/// Saaty consistency check of `pairwise` against its priority vector.
pub fn consistency(
    pairwise: &PairwiseMatrix,
    priority: &[f64],
    cfg: &WeightConfig,
) -> Result<ConsistencyReport, McdaError> {
    let order = pairwise.order();
    if priority.len() != order {
        return Err(McdaError::dimension(
            "priority vs pairwise order",
            order,
            priority.len(),
        ));
    }

    let w = DVector::from_column_slice(priority);
    let aw = pairwise.values() * &w;
    let lambda_max = (0..order).map(|i| aw[i] / w[i]).sum::<f64>() / order as f64;

    // Orders 1 and 2 are consistent by construction.
    if order <= 2 {
        return Ok(ConsistencyReport {
            order,
            lambda_max,
            consistency_index: 0.0,
            random_index: 0.0,
            consistency_ratio: 0.0,
            acceptable: true,
        });
    }

    let random_index = cfg
        .random_index
        .get(order)
        .ok_or(McdaError::MissingRandomIndex { order })?;
    let consistency_index = (lambda_max - order as f64) / (order as f64 - 1.0);
    let consistency_ratio = if random_index > 0.0 {
        consistency_index / random_index
    } else {
        0.0
    };

    Ok(ConsistencyReport {
        order,
        lambda_max,
        consistency_index,
        random_index,
        consistency_ratio,
        acceptable: consistency_ratio < cfg.consistency_threshold,
    })
}

/// AHP weights plus their consistency report.
pub fn ahp_weights(
    pairwise: &PairwiseMatrix,
    cfg: &WeightConfig,
) -> Result<(Vec<f64>, ConsistencyReport), McdaError> {
    let priority = ahp_priority(pairwise.values())?;
    let report = consistency(pairwise, &priority, cfg)?;
    if !report.acceptable {
        warn!(
            consistency_ratio = report.consistency_ratio,
            threshold = cfg.consistency_threshold,
            "Pairwise matrix failed the consistency check; consider revising the judgments"
        );
    }
    Ok((priority, report))
}

// ---------------------------------------------------------------------
//  Entropy
// ---------------------------------------------------------------------

/// Entropy weights per indicator column.
///
/// Expects non-negative values (normally the min-max normalized matrix).
/// An all-zero column is treated as a uniform distribution: entropy 1,
/// divergence 0, no weight.
pub fn entropy_weights(
    indicators: &IndicatorMatrix,
    cfg: &WeightConfig,
) -> Result<Vec<f64>, McdaError> {
    let m = indicators.entities();
    if m < 2 {
        return Err(McdaError::TooFewEntities {
            required: 2,
            got: m,
        });
    }
    let values = indicators.values();
    if let Some(value) = values.iter().copied().find(|v| *v < 0.0) {
        return Err(McdaError::NegativeValue {
            context: "indicator matrix for entropy weighting",
            value,
        });
    }

    let k = 1.0 / (m as f64).ln();
    let eps = cfg.entropy_epsilon;

    let mut divergence = Vec::with_capacity(indicators.indicators());
    for col in 0..indicators.indicators() {
        let column = values.column(col);
        let sum: f64 = column.iter().sum();
        if sum <= 0.0 {
            divergence.push(0.0);
            continue;
        }
        let entropy = -k * column
            .iter()
            .map(|x| {
                let p = x / sum;
                p * (p + eps).ln()
            })
            .sum::<f64>();
        divergence.push((1.0 - entropy).max(0.0));
    }

    let total: f64 = divergence.iter().sum();
    if total <= 0.0 {
        warn!(
            indicators = divergence.len(),
            "Every indicator column is constant; entropy weights fall back to uniform"
        );
        let n = divergence.len() as f64;
        return Ok(vec![1.0 / n; divergence.len()]);
    }

    Ok(divergence.iter().map(|d| d / total).collect())
}

// ---------------------------------------------------------------------
//  Combination
// ---------------------------------------------------------------------

/// Multiply (expanded) AHP weights by entropy weights and renormalize.
///
/// Without a mapping, `ahp[j]` pairs with `entropy[j]` and the two vectors
/// must have equal length.
pub fn combine_weights(
    ahp: &[f64],
    entropy: &[f64],
    mapping: Option<&CategoryMapping>,
) -> Result<Vec<f64>, McdaError> {
    ensure_finite("ahp weights", ahp)?;
    ensure_finite("entropy weights", entropy)?;

    let expanded = match mapping {
        Some(mapping) => {
            if entropy.len() != mapping.len() {
                return Err(McdaError::dimension(
                    "entropy weights vs mapping length",
                    mapping.len(),
                    entropy.len(),
                ));
            }
            mapping.expand(ahp)?
        }
        None => {
            if ahp.len() != entropy.len() {
                return Err(McdaError::dimension(
                    "flat ahp weights vs indicator columns",
                    entropy.len(),
                    ahp.len(),
                ));
            }
            ahp.to_vec()
        }
    };

    let mut combined: Vec<f64> = expanded
        .iter()
        .zip(entropy.iter())
        .map(|(a, e)| a * e)
        .collect();
    normalize_weights(&mut combined, "combined weights")?;
    Ok(combined)
}

/// Full weight derivation: AHP over the criteria, entropy over the
/// indicator columns, and their combination.
pub fn combined_weights(
    pairwise: &PairwiseMatrix,
    indicators: &IndicatorMatrix,
    mapping: Option<&CategoryMapping>,
    cfg: &WeightConfig,
) -> Result<CombinedWeights, McdaError> {
    match mapping {
        Some(mapping) => {
            if pairwise.order() != mapping.categories() {
                return Err(McdaError::dimension(
                    "pairwise order vs mapping categories",
                    mapping.categories(),
                    pairwise.order(),
                ));
            }
            if indicators.indicators() != mapping.len() {
                return Err(McdaError::dimension(
                    "indicator columns vs mapping length",
                    mapping.len(),
                    indicators.indicators(),
                ));
            }
        }
        None => {
            if pairwise.order() != indicators.indicators() {
                return Err(McdaError::dimension(
                    "flat pairwise order vs indicator columns",
                    indicators.indicators(),
                    pairwise.order(),
                ));
            }
        }
    }

    let (ahp, consistency) = ahp_weights(pairwise, cfg)?;
    let entropy = entropy_weights(indicators, cfg)?;
    let combined = combine_weights(&ahp, &entropy, mapping)?;

    debug!(
        criteria = ahp.len(),
        indicators = combined.len(),
        consistency_ratio = consistency.consistency_ratio,
        "Derived combined weights"
    );

    Ok(CombinedWeights {
        ahp,
        entropy,
        combined,
        consistency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_matrix() -> PairwiseMatrix {
        let t = 1.0 / 3.0;
        PairwiseMatrix::from_rows(&[
            vec![1.0, t, t, 1.0, 1.0],
            vec![3.0, 1.0, 1.0, 3.0, 3.0],
            vec![3.0, 1.0, 1.0, 3.0, 3.0],
            vec![1.0, t, t, 1.0, t],
            vec![1.0, t, t, 3.0, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn reference_matrix_weights_and_consistency() {
        let (w, report) = ahp_weights(&reference_matrix(), &WeightConfig::default()).unwrap();
        let expected = [0.1105, 0.3315, 0.3315, 0.0887, 0.1377];
        for (got, want) in w.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((report.lambda_max - 5.1483).abs() < 1e-3);
        assert!((report.consistency_ratio - 0.0331).abs() < 1e-3);
        assert_eq!(report.random_index, 1.12);
        assert!(report.acceptable);
    }

    #[test]
    fn perfectly_consistent_matrix_has_zero_ratio() {
        let w = [0.5, 0.25, 0.15, 0.1];
        let m = DMatrix::from_fn(4, 4, |i, j| w[i] / w[j]);
        let pairwise = PairwiseMatrix::new(m).unwrap();
        let (priority, report) = ahp_weights(&pairwise, &WeightConfig::default()).unwrap();
        for (got, want) in priority.iter().zip(w.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
        assert!(report.consistency_ratio.abs() < 1e-12);
        assert!((report.lambda_max - 4.0).abs() < 1e-12);
    }

    #[test]
    fn cyclic_judgments_fail_the_consistency_check() {
        let ninth = 1.0 / 9.0;
        let pairwise = PairwiseMatrix::from_rows(&[
            vec![1.0, 9.0, ninth],
            vec![ninth, 1.0, 9.0],
            vec![9.0, ninth, 1.0],
        ])
        .unwrap();
        let (_, report) = ahp_weights(&pairwise, &WeightConfig::default()).unwrap();
        assert!(report.consistency_ratio > 1.0);
        assert!(!report.acceptable);
    }

    #[test]
    fn missing_random_index_is_reported() {
        let cfg = WeightConfig {
            random_index: RandomIndexTable::new(vec![0.0, 0.0, 0.58]),
            ..WeightConfig::default()
        };
        let pairwise = PairwiseMatrix::new(DMatrix::from_element(4, 4, 1.0)).unwrap();
        let err = ahp_weights(&pairwise, &cfg).unwrap_err();
        assert_eq!(err, McdaError::MissingRandomIndex { order: 4 });
    }

    #[test]
    fn entropy_prefers_spread_columns_and_ignores_constant_ones() {
        let indicators = IndicatorMatrix::from_rows(&[
            vec![0.0, 0.4, 0.7],
            vec![0.5, 0.5, 0.7],
            vec![1.0, 0.6, 0.7],
        ])
        .unwrap();
        let w = entropy_weights(&indicators, &WeightConfig::default()).unwrap();
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(w[0] > w[1]);
        assert!(w[2] < 1e-6);
    }

    #[test]
    fn entropy_handles_all_zero_column() {
        let indicators =
            IndicatorMatrix::from_rows(&[vec![0.0, 1.0], vec![0.0, 0.0], vec![0.0, 0.5]]).unwrap();
        let w = entropy_weights(&indicators, &WeightConfig::default()).unwrap();
        assert_eq!(w[0], 0.0);
        assert!((w[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn entropy_needs_two_entities() {
        let indicators = IndicatorMatrix::from_rows(&[vec![0.5, 0.5]]).unwrap();
        let err = entropy_weights(&indicators, &WeightConfig::default()).unwrap_err();
        assert_eq!(err, McdaError::TooFewEntities { required: 2, got: 1 });
    }

    #[test]
    fn combine_expands_through_mapping() {
        let mapping = CategoryMapping::new(vec![0, 0, 1], 2).unwrap();
        let combined = combine_weights(&[0.75, 0.25], &[0.5, 0.25, 0.25], Some(&mapping)).unwrap();
        // raw: 0.375, 0.1875, 0.0625 → sum 0.625
        assert!((combined[0] - 0.6).abs() < 1e-12);
        assert!((combined[1] - 0.3).abs() < 1e-12);
        assert!((combined[2] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn flat_combination_requires_matching_lengths() {
        let err = combine_weights(&[0.5, 0.5], &[0.2, 0.3, 0.5], None).unwrap_err();
        assert!(matches!(err, McdaError::DimensionMismatch { expected: 3, got: 2, .. }));
    }

    #[test]
    fn combined_weights_validate_mapping_shape() {
        let pairwise = PairwiseMatrix::from_upper_triangle(2, &[2.0]).unwrap();
        let indicators =
            IndicatorMatrix::from_rows(&[vec![0.0, 1.0, 0.3], vec![1.0, 0.0, 0.6]]).unwrap();

        let three_categories = CategoryMapping::new(vec![0, 1, 2], 3).unwrap();
        let err = combined_weights(
            &pairwise,
            &indicators,
            Some(&three_categories),
            &WeightConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, McdaError::DimensionMismatch { expected: 3, got: 2, .. }));

        let short = CategoryMapping::new(vec![0, 1], 2).unwrap();
        let err =
            combined_weights(&pairwise, &indicators, Some(&short), &WeightConfig::default())
                .unwrap_err();
        assert!(matches!(err, McdaError::DimensionMismatch { expected: 2, got: 3, .. }));

        let ok = CategoryMapping::new(vec![0, 0, 1], 2).unwrap();
        let weights =
            combined_weights(&pairwise, &indicators, Some(&ok), &WeightConfig::default()).unwrap();
        assert_eq!(weights.combined.len(), 3);
        assert!((weights.combined.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
