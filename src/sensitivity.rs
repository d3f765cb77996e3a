//! Monte Carlo rank sensitivity.
//!
//! Each trial scales the top-level weights by independent uniform factors,
//! renormalizes, pushes them through the category mapping onto the fixed
//! secondary weights and re-ranks every entity. Trials are seeded from
//! `(seed, trial)` alone, so a run is reproducible and serial and parallel
//! execution agree bit for bit.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use tracing::debug;

use crate::error::{ensure_finite, McdaError};
use crate::matrix::{normalize_weights, CategoryMapping, IndicatorMatrix};
use crate::scoring::{composite_scores, min_ranks};
use crate::weights::combine_weights;

/// Rows handed to one accumulator when summarizing in parallel.
const SUMMARY_CHUNK: usize = 256;

// ---------------------------------------------------------------------
//  Config
// ---------------------------------------------------------------------

/// Closed interval `[low, high]` of multiplicative weight factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerturbationRange {
    pub low: f64,
    pub high: f64,
}

impl Default for PerturbationRange {
    fn default() -> Self {
        Self {
            low: 0.6,
            high: 1.5,
        }
    }
}

impl PerturbationRange {
    pub fn new(low: f64, high: f64) -> Result<Self, McdaError> {
        let range = Self { low, high };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), McdaError> {
        let ok = self.low.is_finite()
            && self.high.is_finite()
            && self.low > 0.0
            && self.low <= self.high;
        if ok {
            Ok(())
        } else {
            Err(McdaError::InvalidPerturbationRange {
                low: self.low,
                high: self.high,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    pub trials: usize,
    pub perturbation: PerturbationRange,
    pub seed: u64,
    /// Run trials on the rayon pool. Results are identical either way.
    pub parallel: bool,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            trials: 1_000,
            perturbation: PerturbationRange::default(),
            seed: 123,
            parallel: false,
        }
    }
}

// ---------------------------------------------------------------------
//  Distribution and summaries
// ---------------------------------------------------------------------

/// One cell of the trial × entity rank table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSample {
    pub trial: usize,
    pub entity: usize,
    pub rank: usize,
}

/// All per-trial rank vectors, in trial order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDistribution {
    entities: usize,
    trials: Vec<Vec<usize>>,
}

impl RankDistribution {
    pub fn trials(&self) -> usize {
        self.trials.len()
    }

    pub fn entities(&self) -> usize {
        self.entities
    }

    pub fn trial(&self, trial: usize) -> Option<&[usize]> {
        self.trials.get(trial).map(Vec::as_slice)
    }

    pub fn rank_vectors(&self) -> &[Vec<usize>] {
        &self.trials
    }

    /// Ranks of one entity across every trial, `None` if out of range.
    pub fn entity_ranks(&self, entity: usize) -> Option<Vec<usize>> {
        if entity >= self.entities {
            return None;
        }
        self.trials.iter().map(|ranks| ranks.get(entity).copied()).collect()
    }

    /// Long-format table `(trial, entity, rank)` for plotting.
    pub fn samples(&self) -> Vec<RankSample> {
        self.trials
            .iter()
            .enumerate()
            .flat_map(|(trial, ranks)| {
                ranks.iter().enumerate().map(move |(entity, &rank)| RankSample {
                    trial,
                    entity,
                    rank,
                })
            })
            .collect()
    }

    pub fn accumulator(&self) -> RankAccumulator {
        self.trials
            .par_chunks(SUMMARY_CHUNK)
            .map(|chunk| {
                let mut acc = RankAccumulator::new(self.entities);
                for ranks in chunk {
                    acc.push(ranks);
                }
                acc
            })
            .reduce(|| RankAccumulator::new(self.entities), RankAccumulator::merge)
    }

    pub fn summaries(&self) -> Vec<RankSummary> {
        let acc = self.accumulator();
        (0..self.entities)
            .map(|entity| {
                let ranks = self.entity_ranks(entity).unwrap_or_default();
                let best = ranks.iter().copied().min().unwrap_or(0);
                let worst = ranks.iter().copied().max().unwrap_or(0);
                let mut data = Data::new(ranks.iter().map(|&r| r as f64).collect::<Vec<_>>());
                RankSummary {
                    entity,
                    mean_rank: acc.mean(entity),
                    std_rank: acc.std_dev(entity),
                    p_rank_one: acc.p_rank_one(entity),
                    p_top_two: acc.p_top_two(entity),
                    median_rank: data.quantile(0.5),
                    lower_quartile: data.lower_quartile(),
                    upper_quartile: data.upper_quartile(),
                    best_rank: best,
                    worst_rank: worst,
                }
            })
            .collect()
    }
}

/// Order-independent per-entity rank statistics.
///
/// Integer sums make `merge` exactly commutative and associative, so
/// partial accumulators from any partition of the trials combine to the
/// same result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankAccumulator {
    trials: u64,
    rank_sum: Vec<u64>,
    rank_sq_sum: Vec<u64>,
    rank_one: Vec<u64>,
    top_two: Vec<u64>,
}

impl RankAccumulator {
    pub fn new(entities: usize) -> Self {
        Self {
            trials: 0,
            rank_sum: vec![0; entities],
            rank_sq_sum: vec![0; entities],
            rank_one: vec![0; entities],
            top_two: vec![0; entities],
        }
    }

    pub fn push(&mut self, ranks: &[usize]) {
        self.trials += 1;
        for (entity, &rank) in ranks.iter().enumerate().take(self.rank_sum.len()) {
            let r = rank as u64;
            self.rank_sum[entity] += r;
            self.rank_sq_sum[entity] += r * r;
            if rank == 1 {
                self.rank_one[entity] += 1;
            }
            if rank <= 2 {
                self.top_two[entity] += 1;
            }
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.trials += other.trials;
        for (a, b) in [
            (&mut self.rank_sum, &other.rank_sum),
            (&mut self.rank_sq_sum, &other.rank_sq_sum),
            (&mut self.rank_one, &other.rank_one),
            (&mut self.top_two, &other.top_two),
        ] {
            for (x, y) in a.iter_mut().zip(b.iter()) {
                *x += y;
            }
        }
        self
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn mean(&self, entity: usize) -> f64 {
        if self.trials == 0 {
            return 0.0;
        }
        self.rank_sum[entity] as f64 / self.trials as f64
    }

    /// Sample standard deviation (n − 1); zero below two trials.
    pub fn std_dev(&self, entity: usize) -> f64 {
        if self.trials < 2 {
            return 0.0;
        }
        let n = u128::from(self.trials);
        let sum = u128::from(self.rank_sum[entity]);
        let sq = u128::from(self.rank_sq_sum[entity]);
        // n·Σr² − (Σr)² ≥ 0 by Cauchy–Schwarz, exact in integers.
        let numerator = n * sq - sum * sum;
        (numerator as f64 / (n * (n - 1)) as f64).sqrt()
    }

    pub fn p_rank_one(&self, entity: usize) -> f64 {
        self.fraction(self.rank_one[entity])
    }

    pub fn p_top_two(&self, entity: usize) -> f64 {
        self.fraction(self.top_two[entity])
    }

    fn fraction(&self, count: u64) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            count as f64 / self.trials as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSummary {
    pub entity: usize,
    pub mean_rank: f64,
    pub std_rank: f64,
    pub p_rank_one: f64,
    pub p_top_two: f64,
    pub median_rank: f64,
    pub lower_quartile: f64,
    pub upper_quartile: f64,
    pub best_rank: usize,
    pub worst_rank: usize,
}

// ---------------------------------------------------------------------
//  Analysis
// ---------------------------------------------------------------------

/// SplitMix64 finalizer over `(seed, trial)`.
fn trial_seed(seed: u64, trial: u64) -> u64 {
    let mut z = seed ^ trial.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

struct TrialInputs<'a> {
    base_top: &'a [f64],
    secondary: &'a [f64],
    mapping: &'a CategoryMapping,
    indicators: &'a IndicatorMatrix,
    range: PerturbationRange,
    seed: u64,
}

impl TrialInputs<'_> {
    fn run(&self, trial: usize) -> Result<Vec<usize>, McdaError> {
        let mut rng = StdRng::seed_from_u64(trial_seed(self.seed, trial as u64));
        let mut top: Vec<f64> = self
            .base_top
            .iter()
            .map(|w| w * rng.gen_range(self.range.low..=self.range.high))
            .collect();
        normalize_weights(&mut top, "perturbed top-level weights")?;
        let combined = combine_weights(&top, self.secondary, Some(self.mapping))?;
        let scores = composite_scores(self.indicators, &combined)?;
        Ok(min_ranks(&scores))
    }
}

/// Run `cfg.trials` perturbation trials and collect every rank vector.
pub fn analyze(
    base_top: &[f64],
    secondary: &[f64],
    mapping: &CategoryMapping,
    indicators: &IndicatorMatrix,
    cfg: &SensitivityConfig,
) -> Result<RankDistribution, McdaError> {
    if cfg.trials == 0 {
        return Err(McdaError::InvalidParameter {
            name: "trials",
            value: 0.0,
        });
    }
    cfg.perturbation.validate()?;
    if base_top.len() != mapping.categories() {
        return Err(McdaError::dimension(
            "top-level weights vs mapping categories",
            mapping.categories(),
            base_top.len(),
        ));
    }
    if secondary.len() != mapping.len() {
        return Err(McdaError::dimension(
            "secondary weights vs mapping length",
            mapping.len(),
            secondary.len(),
        ));
    }
    if indicators.indicators() != mapping.len() {
        return Err(McdaError::dimension(
            "indicator columns vs mapping length",
            mapping.len(),
            indicators.indicators(),
        ));
    }
    ensure_finite("secondary weights", secondary)?;
    let mut base = base_top.to_vec();
    normalize_weights(&mut base, "top-level weights")?;

    let inputs = TrialInputs {
        base_top: &base,
        secondary,
        mapping,
        indicators,
        range: cfg.perturbation,
        seed: cfg.seed,
    };

    let trials = if cfg.parallel {
        (0..cfg.trials)
            .into_par_iter()
            .map(|trial| inputs.run(trial))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        (0..cfg.trials)
            .map(|trial| inputs.run(trial))
            .collect::<Result<Vec<_>, _>>()?
    };

    debug!(
        trials = cfg.trials,
        entities = indicators.entities(),
        seed = cfg.seed,
        parallel = cfg.parallel,
        "Sensitivity analysis complete"
    );

    Ok(RankDistribution {
        entities: indicators.entities(),
        trials,
    })
}
