use mcda_harness::forecast::{
    fit_logistic, forecast, ForecastConfig, ForecastMethod, ForecastModel, GreyModel,
};
use mcda_harness::reference;
use mcda_harness::McdaError;

#[test]
fn grey_round_trip_on_geometric_series() {
    let cfg = ForecastConfig::default();
    let history = [1.0, 2.0, 4.0, 8.0, 16.0];
    let first = forecast(&history, 0, ForecastMethod::Grey, &cfg).unwrap();
    assert_eq!(first.values.len(), history.len());
    assert!(first.projected().is_empty());

    let second = forecast(first.fitted(), 0, ForecastMethod::Grey, &cfg).unwrap();
    for (a, b) in first.values.iter().zip(second.values.iter()) {
        assert!(((a - b) / a).abs() < 0.15, "{a} vs {b}");
    }

    let m1 = GreyModel::fit(&history, &cfg).unwrap();
    let m2 = GreyModel::fit(first.fitted(), &cfg).unwrap();
    assert!((m1.development_coefficient - m2.development_coefficient).abs() < 0.05);
}

#[test]
fn grey_projection_continues_the_growth() {
    let f = forecast(
        &[1.0, 2.0, 4.0, 8.0, 16.0],
        3,
        ForecastMethod::Grey,
        &ForecastConfig::default(),
    )
    .unwrap();
    assert_eq!(f.model, ForecastModel::Grey);
    assert_eq!(f.projected().len(), 3);
    let expected = [27.2794, 53.1331, 103.489];
    for (got, want) in f.projected().iter().zip(expected.iter()) {
        assert!((got - want).abs() / want < 1e-4, "{got} vs {want}");
    }
}

#[test]
fn decreasing_history_falls_back_without_error() {
    let f = forecast(
        &[10.0, 8.0, 6.0, 4.0, 2.0],
        4,
        ForecastMethod::Logistic,
        &ForecastConfig::default(),
    )
    .unwrap();
    assert_eq!(f.requested, ForecastMethod::Logistic);
    assert!(matches!(f.model, ForecastModel::Grey | ForecastModel::GreyLinear));
    assert!(f.fallback_reason.is_some());
    assert_eq!(f.values.len(), 9);
    assert!(f.values.iter().all(|v| v.is_finite()));
}

#[test]
fn logistic_fit_reports_failure_directly() {
    let err = fit_logistic(&[10.0, 8.0, 6.0, 4.0, 2.0], &ForecastConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        McdaError::ConvergenceFailure { .. } | McdaError::NonGrowthCurve { .. }
    ));
}

#[test]
fn reference_series_record_their_model() {
    let cfg = ForecastConfig::default();
    for (name, history) in reference::FORECAST_SERIES {
        let f = forecast(&history, 5, ForecastMethod::Logistic, &cfg)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(f.values.len(), 11, "{name}");
        assert!(f.values.iter().all(|v| v.is_finite()), "{name}");

        match name {
            // Still accelerating: the capacity runs away and the fit is abandoned.
            "global_ai_investment" => {
                assert!(f.fell_back(), "{name}");
                assert_eq!(f.model, ForecastModel::Grey);
            }
            "model_releases" => {
                assert!(!f.fell_back(), "{name}: {:?}", f.fallback_reason);
                assert_eq!(f.model, ForecastModel::Logistic);
            }
            other => panic!("unexpected series {other}"),
        }
    }
}

#[test]
fn noisy_s_curve_fits_logistic() {
    let history = [1.0, 2.1, 3.9, 7.2, 12.5, 18.1, 25.3, 29.8, 33.4, 35.1];
    let fit = fit_logistic(&history, &ForecastConfig::default()).unwrap();
    assert!((fit.curve.capacity - 37.24).abs() < 0.05, "K = {}", fit.curve.capacity);
    assert!((fit.curve.rate - 0.710).abs() < 0.005, "r = {}", fit.curve.rate);
    assert!((fit.curve.midpoint - 6.007).abs() < 0.01, "t0 = {}", fit.curve.midpoint);

    let f = forecast(&history, 3, ForecastMethod::Logistic, &ForecastConfig::default()).unwrap();
    assert_eq!(f.model, ForecastModel::Logistic);
    assert!(f.projected().iter().all(|v| *v < fit.curve.capacity));
}

#[test]
fn non_finite_history_is_rejected() {
    let err = forecast(
        &[1.0, f64::NAN, 3.0],
        1,
        ForecastMethod::Grey,
        &ForecastConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, McdaError::NonFinite { .. }));
}
