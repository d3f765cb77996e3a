//! Spearman rank correlation between indicator columns.

use nalgebra::{DMatrix, DVector};

use crate::matrix::IndicatorMatrix;

/// Symmetric `indicators × indicators` matrix of Spearman ρ.
///
/// Ties get average ranks. A constant column correlates 0 with every other
/// column and 1 with itself.
pub fn spearman_matrix(indicators: &IndicatorMatrix) -> DMatrix<f64> {
    let mut ranks = DMatrix::<f64>::zeros(indicators.entities(), indicators.indicators());
    for j in 0..indicators.indicators() {
        ranks.set_column(j, &average_ranks(&indicators.column(j)));
    }
    rank_correlation(ranks)
}

pub fn spearman_rho(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let ranks = DMatrix::from_columns(&[average_ranks(x), average_ranks(y)]);
    rank_correlation(ranks)[(0, 1)]
}

/// Pearson correlation between the columns of a rank matrix.
fn rank_correlation(mut ranks: DMatrix<f64>) -> DMatrix<f64> {
    let m = ranks.ncols();
    if ranks.nrows() < 2 {
        return DMatrix::identity(m, m);
    }
    for mut col in ranks.column_iter_mut() {
        let mean = col.mean();
        col.add_scalar_mut(-mean);
    }

    let gram = ranks.tr_mul(&ranks);
    let norms = gram.diagonal().map(f64::sqrt);
    DMatrix::from_fn(m, m, |a, b| {
        if a == b {
            1.0
        } else if norms[a] == 0.0 || norms[b] == 0.0 {
            0.0
        } else {
            gram[(a, b)] / (norms[a] * norms[b])
        }
    })
}

/// Ascending 1-based ranks, tied values sharing their average rank.
fn average_ranks(values: &[f64]) -> DVector<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = DVector::zeros(values.len());
    let mut start = 0usize;
    for group in order.chunk_by(|&a, &b| values[a] == values[b]) {
        // Positions start+1 ..= start+len share their mean.
        let shared = start as f64 + (group.len() as f64 + 1.0) / 2.0;
        for &i in group {
            ranks[i] = shared;
        }
        start += group.len();
    }
    ranks
}
