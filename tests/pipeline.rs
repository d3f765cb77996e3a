use mcda_harness::forecast::ForecastMethod;
use mcda_harness::pipeline::{
    run_analysis, sample_request, AnalysisRequest, BudgetRequest, ForecastRequest,
    SensitivityRequest,
};
use mcda_harness::McdaError;

fn small_request() -> AnalysisRequest {
    serde_json::from_str(
        r#"{
            "entities": ["north", "south", "east", "west"],
            "indicator_names": ["gdp", "patents", "graduates", "startups"],
            "indicators": [
                [10.0, 200.0, 5.0, 40.0],
                [30.0, 100.0, 9.0, 10.0],
                [20.0, 150.0, 1.0, 25.0],
                [ 5.0,  50.0, 0.5,  5.0]
            ],
            "pairwise": [[1.0, 2.0], [0.5, 1.0]],
            "mapping": [0, 0, 1, 1]
        }"#,
    )
    .unwrap()
}

#[test]
fn pipeline_ranks_dominated_entity_last() {
    let report = run_analysis(&small_request()).unwrap();
    // "west" is beaten on every indicator.
    assert_eq!(report.rank_of("west"), Some(4));
    assert_eq!(report.ranking.last().unwrap().entity, "west");
    let ranks: Vec<usize> = report.ranking.iter().map(|s| s.rank).collect();
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn pipeline_budget_defaults_to_ahp_weights() {
    let mut req = small_request();
    req.budget = Some(BudgetRequest {
        covariance: vec![vec![0.04, 0.01], vec![0.01, 0.09]],
        betas: vec![1.0, 1.0],
        weights: None,
        total_budget: 2.0,
        risk_aversion: 1.0,
    });
    let report = run_analysis(&req).unwrap();
    let budget = report.budget.unwrap();
    assert_eq!(budget.weights, report.weights.ahp);
    let allocation = budget.allocation.unwrap();
    assert!((allocation.allocation.iter().sum::<f64>() - 2.0).abs() < 1e-9);
    // Criterion 0 has twice the weight and lower variance.
    assert!(allocation.allocation[0] > allocation.allocation[1]);
}

#[test]
fn pipeline_sensitivity_with_samples() {
    let mut req = small_request();
    req.config.sensitivity.trials = 40;
    req.sensitivity = Some(SensitivityRequest {
        include_samples: true,
        ..SensitivityRequest::default()
    });
    let report = run_analysis(&req).unwrap();
    let sens = report.sensitivity.unwrap();
    assert_eq!(sens.summaries.len(), 4);
    assert_eq!(sens.summaries[3].name, "west");
    assert_eq!(sens.summaries[3].summary.p_rank_one, 0.0);
    assert_eq!(sens.samples.unwrap().len(), 40 * 4);
}

#[test]
fn pipeline_flat_sensitivity_uses_identity_mapping() {
    let mut req = small_request();
    req.mapping = None;
    req.pairwise = vec![
        vec![1.0, 2.0, 2.0, 4.0],
        vec![0.5, 1.0, 1.0, 2.0],
        vec![0.5, 1.0, 1.0, 2.0],
        vec![0.25, 0.5, 0.5, 1.0],
    ];
    req.config.sensitivity.trials = 20;
    req.sensitivity = Some(SensitivityRequest::default());
    let report = run_analysis(&req).unwrap();
    assert_eq!(report.weights.ahp.len(), 4);
    assert!(report.weights.consistency.consistency_ratio.abs() < 1e-9);
    assert_eq!(report.sensitivity.unwrap().summaries.len(), 4);
}

#[test]
fn pipeline_forecasts_keep_request_names() {
    let mut req = small_request();
    req.forecasts = vec![
        ForecastRequest {
            name: "doubling".into(),
            history: vec![1.0, 2.0, 4.0, 8.0],
            steps: 2,
            method: ForecastMethod::Grey,
        },
        ForecastRequest {
            name: "shrinking".into(),
            history: vec![9.0, 7.0, 5.0, 3.0],
            steps: 1,
            method: ForecastMethod::Logistic,
        },
    ];
    let report = run_analysis(&req).unwrap();
    assert_eq!(report.forecasts[0].name, "doubling");
    assert_eq!(report.forecasts[0].forecast.values.len(), 6);
    assert_eq!(report.forecasts[1].name, "shrinking");
    assert!(report.forecasts[1].forecast.fell_back());
}

#[test]
fn pipeline_rejects_short_forecast_history() {
    let mut req = small_request();
    req.forecasts = vec![ForecastRequest {
        name: "one".into(),
        history: vec![1.0],
        steps: 2,
        method: ForecastMethod::Grey,
    }];
    assert_eq!(
        run_analysis(&req).unwrap_err(),
        McdaError::InsufficientHistory { required: 2, got: 1 }
    );
}

#[test]
fn sample_request_round_trips_through_json() {
    let req = sample_request();
    let json = serde_json::to_string(&req).unwrap();
    let back: AnalysisRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(back.entities, req.entities);
    assert_eq!(back.mapping, req.mapping);
    assert_eq!(back.config, req.config);
}
