use mcda_harness::matrix::{CategoryMapping, IndicatorMatrix, PairwiseMatrix};
use mcda_harness::reference;
use mcda_harness::scoring::score_and_rank;
use mcda_harness::weights::{ahp_weights, combined_weights, entropy_weights, WeightConfig};
use mcda_harness::McdaError;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn reference_pairwise_matrix_reproduces_published_weights() {
    let pairwise = reference::pairwise().unwrap();
    let (w, report) = ahp_weights(&pairwise, &WeightConfig::default()).unwrap();

    for (got, published) in w.iter().zip(reference::TOP_LEVEL_WEIGHTS.iter()) {
        assert!(approx_eq(*got, *published, 1e-3), "{got} vs {published}");
    }
    assert!(approx_eq(w.iter().sum::<f64>(), 1.0, 1e-9));
    // Talent and research rows are identical, so their weights are too.
    assert_eq!(w[1], w[2]);

    assert_eq!(report.order, 5);
    assert!(approx_eq(report.random_index, 1.12, 1e-12));
    assert!(approx_eq(report.lambda_max, 5.14826, 1e-4));
    assert!(approx_eq(report.consistency_ratio, 0.03309, 1e-4));
    assert!(report.acceptable);
}

#[test]
fn reference_dataset_combined_weights_are_normalized() {
    let indicators = reference::indicators().unwrap().min_max_normalized();
    let mapping = reference::mapping().unwrap();
    let weights = combined_weights(
        &reference::pairwise().unwrap(),
        &indicators,
        Some(&mapping),
        &WeightConfig::default(),
    )
    .unwrap();

    assert_eq!(weights.ahp.len(), 5);
    assert_eq!(weights.entropy.len(), 9);
    assert_eq!(weights.combined.len(), 9);
    for w in [&weights.entropy, &weights.combined] {
        assert!(approx_eq(w.iter().sum::<f64>(), 1.0, 1e-9));
        assert!(w.iter().all(|v| *v >= 0.0));
    }

    let ranking = score_and_rank(&indicators, &weights.combined).unwrap();
    assert_eq!(ranking.ranks.iter().filter(|r| **r == 1).count(), 1);
}

#[test]
fn constant_column_gets_negligible_entropy_weight() {
    let indicators = IndicatorMatrix::from_rows(&[
        vec![0.0, 0.4, 0.7],
        vec![0.5, 0.4, 0.1],
        vec![1.0, 0.4, 0.9],
        vec![0.2, 0.4, 0.0],
    ])
    .unwrap();
    let w = entropy_weights(&indicators, &WeightConfig::default()).unwrap();
    assert!(w[1] < 1e-6, "{w:?}");
    assert!(approx_eq(w.iter().sum::<f64>(), 1.0, 1e-9));
}

#[test]
fn flat_case_requires_matching_order() {
    let pairwise = PairwiseMatrix::from_rows(&[vec![1.0, 3.0], vec![1.0 / 3.0, 1.0]]).unwrap();
    let indicators =
        IndicatorMatrix::from_rows(&[vec![0.1, 0.2, 0.3], vec![0.9, 0.8, 0.7]]).unwrap();
    let err = combined_weights(&pairwise, &indicators, None, &WeightConfig::default()).unwrap_err();
    assert!(matches!(err, McdaError::DimensionMismatch { .. }));

    // The same data is fine once a mapping says how columns group.
    let mapping = CategoryMapping::new(vec![0, 0, 1], 2).unwrap();
    let weights =
        combined_weights(&pairwise, &indicators, Some(&mapping), &WeightConfig::default()).unwrap();
    assert_eq!(weights.combined.len(), 3);
}

#[test]
fn mapping_categories_must_match_pairwise_order() {
    let indicators = reference::indicators().unwrap().min_max_normalized();
    let mapping = CategoryMapping::uniform(3, 3).unwrap();
    let err = combined_weights(
        &reference::pairwise().unwrap(),
        &indicators,
        Some(&mapping),
        &WeightConfig::default(),
    )
    .unwrap_err();
    assert_eq!(
        err,
        McdaError::DimensionMismatch {
            context: "pairwise order vs mapping categories",
            expected: 3,
            got: 5,
        }
    );
}

#[test]
fn concentrated_weight_ranks_unique_leader_first() {
    let n = 4;
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let indicators = IndicatorMatrix::from_rows(&rows).unwrap();
    let ranking = score_and_rank(&indicators, &[1.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(ranking.ranks[0], 1);
    assert!(ranking.ranks[1..].iter().all(|r| *r == 2));
}
