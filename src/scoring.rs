//! Composite scoring and ranking.

use std::cmp::Ordering;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, McdaError};
use crate::matrix::IndicatorMatrix;

/// Per-entity composite scores and their ranks (1 = best).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub scores: Vec<f64>,
    pub ranks: Vec<usize>,
}

impl Ranking {
    /// Entity indices from best to worst; ties keep index order.
    pub fn order(&self) -> Vec<usize> {
        descending_order(&self.scores)
    }
}

/// `score[i] = Σ_j indicators[i][j] * weights[j]`.
pub fn composite_scores(
    indicators: &IndicatorMatrix,
    weights: &[f64],
) -> Result<Vec<f64>, McdaError> {
    if weights.len() != indicators.indicators() {
        return Err(McdaError::dimension(
            "weights vs indicator columns",
            indicators.indicators(),
            weights.len(),
        ));
    }
    ensure_finite("weights", weights)?;
    let w = DVector::from_column_slice(weights);
    let scores = indicators.values() * w;
    Ok(scores.iter().copied().collect())
}

/// Rank scores descending with the minimum-rank tie rule:
/// `[5, 5, 3]` → `[1, 1, 3]`.
pub fn min_ranks(scores: &[f64]) -> Vec<usize> {
    let order = descending_order(scores);
    let mut ranks = vec![0usize; scores.len()];
    for (pos, &idx) in order.iter().enumerate() {
        ranks[idx] = if pos > 0 && scores[order[pos - 1]] == scores[idx] {
            ranks[order[pos - 1]]
        } else {
            pos + 1
        };
    }
    ranks
}

pub fn score_and_rank(
    indicators: &IndicatorMatrix,
    weights: &[f64],
) -> Result<Ranking, McdaError> {
    let scores = composite_scores(indicators, weights)?;
    let ranks = min_ranks(&scores);
    Ok(Ranking { scores, ranks })
}

fn descending_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    order
}
