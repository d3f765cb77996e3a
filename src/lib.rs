#![forbid(unsafe_code)]

//! # mcda-harness
//!
//! Score and rank entities on a composite index, and stress-test that
//! ranking.
//!
//! Criterion weights come from an expert's pairwise comparisons (AHP, with a
//! consistency check) and are spread over the indicator columns through a
//! fixed mapping, where they meet objective entropy weights computed from the
//! data itself. The combined weights drive a linear composite score with
//! minimum-rank ties. Around that core sit three numerical satellites:
//! GM(1,1)/logistic indicator forecasting with provenance-tagged fallback, a
//! concave budget allocation over the criteria, and a seeded Monte Carlo
//! perturbation of the criterion weights that reports how stable each rank is.

pub mod budget;
pub mod correlation;
pub mod error;
pub mod forecast;
pub mod matrix;
pub mod pipeline;
pub mod reference;
pub mod scoring;
pub mod sensitivity;
pub mod weights;

pub use budget::{optimize_budget, BudgetAllocation, OptimizerConfig};
pub use correlation::{spearman_matrix, spearman_rho};
pub use error::McdaError;
pub use forecast::{
    fit_logistic, forecast, Forecast, ForecastConfig, ForecastMethod, ForecastModel, GreyModel,
    LogisticCurve, LogisticFit,
};
pub use matrix::{normalize_weights, CategoryMapping, IndicatorMatrix, PairwiseMatrix};
pub use pipeline::{run_analysis, sample_request, AnalysisConfig, AnalysisReport, AnalysisRequest};
pub use scoring::{composite_scores, min_ranks, score_and_rank, Ranking};
pub use sensitivity::{
    analyze, PerturbationRange, RankAccumulator, RankDistribution, RankSample, RankSummary,
    SensitivityConfig,
};
pub use weights::{
    ahp_priority, ahp_weights, combine_weights, combined_weights, consistency, entropy_weights,
    CombinedWeights, ConsistencyReport, RandomIndexTable, WeightConfig,
};
