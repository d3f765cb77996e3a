//! Indicator table → weights → ranking → forecasts → budget → sensitivity.
//!
//! One JSON request drives a full analysis run:
//! 1. **Normalize**: min-max scale every indicator column (optional)
//! 2. **Weight**: AHP over the criteria, entropy over the columns, combined
//! 3. **Rank**: composite scores with minimum-rank ties, plus Spearman ρ
//! 4. **Forecast**: each named series, logistic or grey
//! 5. **Allocate**: budget across criteria (AHP weights unless overridden)
//! 6. **Stress**: Monte Carlo perturbation of the criterion weights
//!
//! Usage:
//! ```bash
//! mcda analyze --input request.json --out report.json
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::budget::{optimize_budget, BudgetAllocation, OptimizerConfig};
use crate::correlation::spearman_matrix;
use crate::error::McdaError;
use crate::forecast::{forecast, Forecast, ForecastConfig, ForecastMethod};
use crate::matrix::{dense_from_rows, matrix_rows, CategoryMapping, IndicatorMatrix, PairwiseMatrix};
use crate::reference;
use crate::scoring::score_and_rank;
use crate::sensitivity::{analyze, RankSample, RankSummary, SensitivityConfig};
use crate::weights::{combined_weights, CombinedWeights, WeightConfig};

// =============================================================================
// Request
// =============================================================================

/// Tuning knobs for every stage; any part may be omitted in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub weights: WeightConfig,
    pub forecast: ForecastConfig,
    pub optimizer: OptimizerConfig,
    pub sensitivity: SensitivityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub name: String,
    pub history: Vec<f64>,
    #[serde(default)]
    pub steps: usize,
    #[serde(default = "default_method")]
    pub method: ForecastMethod,
}

fn default_method() -> ForecastMethod {
    ForecastMethod::Logistic
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRequest {
    /// Square, one row per criterion.
    pub covariance: Vec<Vec<f64>>,
    pub betas: Vec<f64>,
    /// Category weights; the AHP weights when absent.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    #[serde(default = "default_total_budget")]
    pub total_budget: f64,
    #[serde(default = "default_risk_aversion")]
    pub risk_aversion: f64,
}

fn default_total_budget() -> f64 {
    1.0
}

fn default_risk_aversion() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRequest {
    /// Baseline criterion weights; the AHP weights when absent.
    #[serde(default)]
    pub top_level_weights: Option<Vec<f64>>,
    /// Fixed per-indicator weights; the entropy weights when absent.
    #[serde(default)]
    pub secondary_weights: Option<Vec<f64>>,
    /// Include the full trial × entity rank table in the report.
    #[serde(default)]
    pub include_samples: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub entities: Vec<String>,
    #[serde(default)]
    pub indicator_names: Vec<String>,
    /// Raw indicator rows, one per entity.
    pub indicators: Vec<Vec<f64>>,
    pub pairwise: Vec<Vec<f64>>,
    /// Indicator column → criterion. Without it, columns and criteria pair
    /// up one-to-one.
    #[serde(default)]
    pub mapping: Option<Vec<usize>>,
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(default)]
    pub forecasts: Vec<ForecastRequest>,
    #[serde(default)]
    pub budget: Option<BudgetRequest>,
    #[serde(default)]
    pub sensitivity: Option<SensitivityRequest>,
    #[serde(default)]
    pub config: AnalysisConfig,
}

fn default_normalize() -> bool {
    true
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityScore {
    pub entity: String,
    pub score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedForecast {
    pub name: String,
    #[serde(flatten)]
    pub forecast: Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub weights: Vec<f64>,
    /// `None` when the optimizer did not converge.
    pub allocation: Option<BudgetAllocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRankSummary {
    pub name: String,
    #[serde(flatten)]
    pub summary: RankSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub trials: usize,
    pub seed: u64,
    pub summaries: Vec<EntityRankSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<RankSample>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub entities: Vec<String>,
    pub indicator_names: Vec<String>,
    pub weights: CombinedWeights,
    /// Best first.
    pub ranking: Vec<EntityScore>,
    pub spearman: Vec<Vec<f64>>,
    pub forecasts: Vec<NamedForecast>,
    pub budget: Option<BudgetReport>,
    pub sensitivity: Option<SensitivityReport>,
}

impl AnalysisReport {
    pub fn rank_of(&self, entity: &str) -> Option<usize> {
        self.ranking
            .iter()
            .find(|s| s.entity == entity)
            .map(|s| s.rank)
    }
}

// =============================================================================
// Orchestration
// =============================================================================

pub fn run_analysis(req: &AnalysisRequest) -> Result<AnalysisReport, McdaError> {
    let cfg = &req.config;

    let raw = IndicatorMatrix::from_rows(&req.indicators)?;
    if req.entities.len() != raw.entities() {
        return Err(McdaError::dimension(
            "entity names vs indicator rows",
            raw.entities(),
            req.entities.len(),
        ));
    }
    let indicator_names = if req.indicator_names.is_empty() {
        (0..raw.indicators()).map(|j| format!("x{}", j + 1)).collect()
    } else if req.indicator_names.len() == raw.indicators() {
        req.indicator_names.clone()
    } else {
        return Err(McdaError::dimension(
            "indicator names vs indicator columns",
            raw.indicators(),
            req.indicator_names.len(),
        ));
    };

    let indicators = if req.normalize {
        raw.min_max_normalized()
    } else {
        raw
    };
    let pairwise = PairwiseMatrix::from_rows(&req.pairwise)?;
    let mapping = req
        .mapping
        .clone()
        .map(|assignments| CategoryMapping::new(assignments, pairwise.order()))
        .transpose()?;

    let weights = combined_weights(&pairwise, &indicators, mapping.as_ref(), &cfg.weights)?;
    let ranking = score_and_rank(&indicators, &weights.combined)?;
    let ranked: Vec<EntityScore> = ranking
        .order()
        .into_iter()
        .map(|i| EntityScore {
            entity: req.entities[i].clone(),
            score: ranking.scores[i],
            rank: ranking.ranks[i],
        })
        .collect();

    let spearman = matrix_rows(&spearman_matrix(&indicators));

    let forecasts = req
        .forecasts
        .iter()
        .map(|f| {
            forecast(&f.history, f.steps, f.method, &cfg.forecast).map(|forecast| NamedForecast {
                name: f.name.clone(),
                forecast,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let budget = match &req.budget {
        Some(b) => {
            let budget_weights = b.weights.clone().unwrap_or_else(|| weights.ahp.clone());
            let cov = dense_from_rows("covariance", &b.covariance)?;
            let allocation = optimize_budget(
                &cov,
                &budget_weights,
                &b.betas,
                b.total_budget,
                b.risk_aversion,
                &cfg.optimizer,
            )?;
            Some(BudgetReport {
                weights: budget_weights,
                allocation,
            })
        }
        None => None,
    };

    let sensitivity = match &req.sensitivity {
        Some(s) => {
            let mapping = match &mapping {
                Some(m) => m.clone(),
                None => CategoryMapping::identity(indicators.indicators())?,
            };
            let base = s.top_level_weights.as_deref().unwrap_or(weights.ahp.as_slice());
            let secondary = s.secondary_weights.as_deref().unwrap_or(weights.entropy.as_slice());
            let dist = analyze(base, secondary, &mapping, &indicators, &cfg.sensitivity)?;
            let summaries = dist
                .summaries()
                .into_iter()
                .map(|summary| EntityRankSummary {
                    name: req.entities[summary.entity].clone(),
                    summary,
                })
                .collect();
            Some(SensitivityReport {
                trials: dist.trials(),
                seed: cfg.sensitivity.seed,
                summaries,
                samples: s.include_samples.then(|| dist.samples()),
            })
        }
        None => None,
    };

    debug!(
        entities = req.entities.len(),
        indicators = indicators.indicators(),
        consistency_ratio = weights.consistency.consistency_ratio,
        forecasts = forecasts.len(),
        "Analysis complete"
    );

    Ok(AnalysisReport {
        entities: req.entities.clone(),
        indicator_names,
        weights,
        ranking: ranked,
        spearman,
        forecasts,
        budget,
        sensitivity,
    })
}

/// A complete request over the built-in reference dataset.
pub fn sample_request() -> AnalysisRequest {
    AnalysisRequest {
        entities: reference::ENTITIES.iter().map(|s| s.to_string()).collect(),
        indicator_names: reference::INDICATORS.iter().map(|s| s.to_string()).collect(),
        indicators: reference::indicator_rows(),
        pairwise: reference::PAIRWISE.iter().map(|r| r.to_vec()).collect(),
        mapping: Some(reference::INDICATOR_MAPPING.to_vec()),
        normalize: true,
        forecasts: reference::FORECAST_SERIES
            .iter()
            .map(|(name, history)| ForecastRequest {
                name: name.to_string(),
                history: history.to_vec(),
                steps: 5,
                method: ForecastMethod::Logistic,
            })
            .collect(),
        budget: Some(BudgetRequest {
            covariance: reference::budget_covariance(),
            betas: reference::BUDGET_BETAS.to_vec(),
            weights: None,
            total_budget: 1.0,
            risk_aversion: 2.0,
        }),
        sensitivity: Some(SensitivityRequest::default()),
        config: AnalysisConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_request_runs_end_to_end() {
        let mut req = sample_request();
        req.config.sensitivity.trials = 50;
        let report = run_analysis(&req).unwrap();

        assert_eq!(report.ranking.len(), 10);
        assert_eq!(report.ranking[0].rank, 1);
        assert!(report.weights.consistency.acceptable);
        assert_eq!(report.spearman.len(), 9);
        assert_eq!(report.forecasts.len(), 2);
        assert_eq!(report.forecasts[0].forecast.values.len(), 11);

        let budget = report.budget.unwrap();
        let allocation = budget.allocation.unwrap();
        assert!((allocation.allocation.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let sensitivity = report.sensitivity.unwrap();
        assert_eq!(sensitivity.trials, 50);
        assert_eq!(sensitivity.summaries.len(), 10);
        assert!(sensitivity.samples.is_none());
    }

    #[test]
    fn entity_names_must_match_rows() {
        let mut req = sample_request();
        req.entities.pop();
        assert!(matches!(
            run_analysis(&req),
            Err(McdaError::DimensionMismatch {
                context: "entity names vs indicator rows",
                ..
            })
        ));
    }

    #[test]
    fn minimal_json_request_uses_defaults() {
        let json = r#"{
            "entities": ["a", "b", "c"],
            "indicators": [[1.0, 5.0], [2.0, 3.0], [3.0, 1.0]],
            "pairwise": [[1.0, 2.0], [0.5, 1.0]]
        }"#;
        let req: AnalysisRequest = serde_json::from_str(json).unwrap();
        assert!(req.normalize);
        assert_eq!(req.config, AnalysisConfig::default());

        let report = run_analysis(&req).unwrap();
        assert_eq!(report.indicator_names, vec!["x1", "x2"]);
        assert!(report.budget.is_none());
        assert!(report.sensitivity.is_none());
        assert_eq!(report.weights.consistency.consistency_ratio, 0.0);
    }
}
