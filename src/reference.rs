//! Built-in reference dataset: the ten-country AI competitiveness study.
//!
//! The criteria, pairwise judgments, mapping and published weights are the
//! study's own. The indicator table is illustrative: it keeps the study's
//! shape (ten entities, nine secondary indicators) so the full pipeline can
//! run without external data.

use crate::error::McdaError;
use crate::matrix::{CategoryMapping, IndicatorMatrix, PairwiseMatrix};

pub const CRITERIA: [&str; 5] = [
    "infrastructure",
    "talent & education",
    "research & innovation",
    "data & application",
    "policy & capital",
];

pub const INDICATORS: [&str; 9] = [
    "compute_capacity",
    "data_center_count",
    "ai_researchers",
    "stem_graduates",
    "ai_publications",
    "ai_patents",
    "open_datasets",
    "enterprise_adoption",
    "public_ai_investment",
];

pub const ENTITIES: [&str; 10] = [
    "USA",
    "China",
    "UK",
    "Germany",
    "Japan",
    "France",
    "Canada",
    "South Korea",
    "India",
    "UAE",
];

/// Secondary indicator → criterion.
pub const INDICATOR_MAPPING: [usize; 9] = [0, 0, 1, 1, 2, 2, 3, 3, 4];

pub const PAIRWISE: [[f64; 5]; 5] = [
    [1.0, 1.0 / 3.0, 1.0 / 3.0, 1.0, 1.0],
    [3.0, 1.0, 1.0, 3.0, 3.0],
    [3.0, 1.0, 1.0, 3.0, 3.0],
    [1.0, 1.0 / 3.0, 1.0 / 3.0, 1.0, 1.0 / 3.0],
    [1.0, 1.0 / 3.0, 1.0 / 3.0, 3.0, 1.0],
];

/// Published criterion weights (AHP of [`PAIRWISE`], four decimals).
pub const TOP_LEVEL_WEIGHTS: [f64; 5] = [0.1105, 0.3315, 0.3315, 0.0887, 0.1377];

/// Published secondary (entropy) weights.
pub const SECONDARY_WEIGHTS: [f64; 9] = [
    0.0853, 0.0089, 0.2640, 0.0839, 0.1657, 0.2113, 0.0225, 0.0630, 0.0954,
];

/// Return sensitivities per criterion for the budget problem.
pub const BUDGET_BETAS: [f64; 5] = [1.2, 1.5, 1.4, 0.9, 1.1];

pub const INDICATOR_ROWS: [[f64; 9]; 10] = [
    [2100.0, 5380.0, 62.0, 820.0, 41.0, 29.0, 310.0, 78.0, 52.0],
    [1450.0, 450.0, 48.0, 3570.0, 57.0, 63.0, 190.0, 71.0, 61.0],
    [310.0, 520.0, 14.0, 210.0, 11.0, 4.0, 120.0, 62.0, 9.5],
    [280.0, 490.0, 12.0, 330.0, 10.0, 7.0, 95.0, 58.0, 8.1],
    [560.0, 220.0, 9.0, 310.0, 8.0, 15.0, 80.0, 55.0, 7.4],
    [250.0, 320.0, 8.0, 260.0, 7.0, 5.0, 88.0, 54.0, 9.0],
    [190.0, 330.0, 7.0, 140.0, 6.0, 3.0, 70.0, 57.0, 6.8],
    [270.0, 150.0, 6.0, 200.0, 9.0, 18.0, 60.0, 66.0, 7.0],
    [120.0, 150.0, 11.0, 2550.0, 14.0, 6.0, 75.0, 48.0, 4.2],
    [90.0, 50.0, 2.0, 25.0, 1.0, 0.5, 30.0, 69.0, 10.5],
];

/// Annual series for demonstrating forecasts.
pub const FORECAST_SERIES: [(&str, [f64; 6]); 2] = [
    (
        "global_ai_investment",
        [50.0, 68.0, 93.0, 94.0, 135.0, 180.0],
    ),
    ("model_releases", [12.0, 19.0, 31.0, 48.0, 66.0, 82.0]),
];

pub fn pairwise() -> Result<PairwiseMatrix, McdaError> {
    let rows: Vec<Vec<f64>> = PAIRWISE.iter().map(|r| r.to_vec()).collect();
    PairwiseMatrix::from_rows(&rows)
}

pub fn mapping() -> Result<CategoryMapping, McdaError> {
    CategoryMapping::new(INDICATOR_MAPPING.to_vec(), CRITERIA.len())
}

pub fn indicator_rows() -> Vec<Vec<f64>> {
    INDICATOR_ROWS.iter().map(|r| r.to_vec()).collect()
}

pub fn indicators() -> Result<IndicatorMatrix, McdaError> {
    IndicatorMatrix::from_rows(&indicator_rows())
}

/// Default covariance for budget runs: 0.05 variance, 0.01 covariance.
pub fn budget_covariance() -> Vec<Vec<f64>> {
    let n = CRITERIA.len();
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 0.05 } else { 0.01 }).collect())
        .collect()
}
