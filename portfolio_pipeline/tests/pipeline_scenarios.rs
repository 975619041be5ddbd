mod common;

use approx::assert_relative_eq;
use chrono::Datelike;
use common::*;
use portfolio_pipeline::{
    errors::PipelineError,
    estimators::{ReturnsMethod, RiskMethod},
    fetch::DropReason,
    optimizer::ObjectiveKind,
    report::{ErrorReport, ObjectiveSlot},
    service::{AllocationQuery, PortfolioService},
    solver::WeightBounds,
};

fn query(list: &[&str], objective: ObjectiveKind) -> AllocationQuery {
    let (_, start, end) = market();
    AllocationQuery {
        objective,
        ..AllocationQuery::new(symbols(list), start, end)
    }
}

#[tokio::test]
async fn min_volatility_over_two_symbols() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);

    let report = service
        .optimize_allocation(&query(&["AAA", "BBB"], ObjectiveKind::MinVolatility))
        .await
        .unwrap();

    let weights = &report.allocation.weights;
    assert_eq!(weights.keys().collect::<Vec<_>>(), ["AAA", "BBB"]);
    assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-4);
    assert!(weights.values().all(|w| (0.0..=1.0).contains(w)));
    assert!(report.allocation.annual_volatility >= 0.0);
    assert!(report.allocation.sharpe_ratio.is_finite());
    // BBB wobbles less, so it should carry most of the minimum-variance book.
    assert!(weights["BBB"] > weights["AAA"]);
    assert_eq!(report.diagnostics.observations, 120);
    assert!(report.diagnostics.dropped.is_empty());
}

#[tokio::test]
async fn single_symbol_optimization_is_insufficient() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);

    let err = service
        .optimize_allocation(&query(&["AAA"], ObjectiveKind::MaxSharpe))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { .. }), "{err:?}");
}

#[tokio::test]
async fn duplicate_symbols_count_once() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);

    let err = service
        .optimize_allocation(&query(&["aaa", "AAA "], ObjectiveKind::MinVolatility))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InsufficientData { .. }), "{err:?}");
}

#[tokio::test]
async fn no_data_anywhere_is_reported_as_such() {
    let service = PortfolioService::new(config(), MemorySource::new());

    let err = service
        .optimize_allocation(&query(&["XXX", "YYY"], ObjectiveKind::MaxSharpe))
        .await
        .unwrap_err();
    let PipelineError::NoData { symbols, dropped } = &err else {
        panic!("expected NoData, got {err:?}");
    };
    assert_eq!(symbols, &["XXX", "YYY"]);
    assert!(dropped.iter().all(|d| d.reason == DropReason::NoData));

    let json = serde_json::to_value(ErrorReport::from(&err)).unwrap();
    assert_eq!(json["error"], "no_data");
}

#[tokio::test]
async fn missing_symbol_is_dropped_and_the_rest_is_allocated() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);

    let report = service
        .optimize_allocation(&query(&["AAA", "ZZZ", "DDD"], ObjectiveKind::MaxSharpe))
        .await
        .unwrap();

    assert_eq!(report.diagnostics.symbols_used, ["AAA", "DDD"]);
    assert_eq!(report.allocation.weights.len(), 2);
    assert_eq!(report.diagnostics.dropped.len(), 1);
    assert_eq!(report.diagnostics.dropped[0].symbol, "ZZZ");
    assert_eq!(report.diagnostics.dropped[0].reason, DropReason::NoData);
}

#[tokio::test]
async fn failing_symbol_becomes_a_diagnostic() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source.failing("CCC"));

    let report = service
        .optimize_allocation(&query(&["AAA", "BBB", "CCC"], ObjectiveKind::MaxSharpe))
        .await
        .unwrap();

    assert_eq!(report.allocation.weights.len(), 2);
    let dropped = &report.diagnostics.dropped;
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].symbol, "CCC");
    assert!(matches!(&dropped[0].reason, DropReason::FetchFailed(msg) if msg.contains("500")));
}

#[tokio::test]
async fn series_without_shared_dates_is_set_aside() {
    let (source, start, end) = market();
    let weekends: Vec<_> = (0..30)
        .map(|i| start + chrono::Duration::days(i))
        .filter(|d| d.weekday() == chrono::Weekday::Sat)
        .collect();
    let closes = vec![10.0; weekends.len()];
    let source = source.with_series("SAT", &weekends, &closes);
    let service = PortfolioService::new(config(), source);

    let report = service
        .optimize_allocation(&AllocationQuery {
            objective: ObjectiveKind::MinVolatility,
            ..AllocationQuery::new(symbols(&["AAA", "SAT", "BBB"]), start, end)
        })
        .await
        .unwrap();

    assert_eq!(report.diagnostics.symbols_used, ["AAA", "BBB"]);
    assert_eq!(report.diagnostics.dropped[0].symbol, "SAT");
    assert_eq!(report.diagnostics.dropped[0].reason, DropReason::Misaligned);
}

#[tokio::test]
async fn repeated_runs_give_identical_weights() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);
    let q = AllocationQuery {
        risk_method: RiskMethod::LedoitWolf,
        ..query(&["AAA", "BBB", "DDD"], ObjectiveKind::MaxSharpe)
    };

    let first = service.optimize_allocation(&q).await.unwrap();
    let second = service.optimize_allocation(&q).await.unwrap();
    assert_eq!(first.allocation.weights, second.allocation.weights);
    assert_eq!(first.allocation.sharpe_ratio, second.allocation.sharpe_ratio);
}

#[tokio::test]
async fn weight_caps_are_respected() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);
    let q = AllocationQuery {
        bounds: WeightBounds::new(0.0, 0.4).unwrap(),
        ..query(&["AAA", "BBB", "DDD"], ObjectiveKind::MaxSharpe)
    };

    let report = service.optimize_allocation(&q).await.unwrap();
    let weights = &report.allocation.weights;
    assert!(weights.values().all(|&w| w <= 0.4 + 1e-5), "{weights:?}");
    assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn two_row_window_is_too_short_to_estimate() {
    let days = [date(2024, 1, 2), date(2024, 1, 3)];
    let source = MemorySource::new()
        .with_series("AAA", &days, &[10.0, 10.5])
        .with_series("BBB", &days, &[20.0, 19.5]);
    let service = PortfolioService::new(config(), source);

    let err = service
        .optimize_allocation(&AllocationQuery {
            objective: ObjectiveKind::MinVolatility,
            ..AllocationQuery::new(symbols(&["AAA", "BBB", "ZZZ"]), days[0], days[1])
        })
        .await
        .unwrap_err();

    let PipelineError::InsufficientData {
        survived,
        observations,
        dropped,
    } = &err
    else {
        panic!("expected InsufficientData, got {err:?}");
    };
    assert_eq!(survived, &["AAA", "BBB"]);
    assert_eq!(*observations, 2);
    assert_eq!(dropped[0].symbol, "ZZZ");
    assert_eq!(err.kind(), "insufficient_data");
}

#[tokio::test]
async fn full_optimization_fills_every_slot() {
    let (source, _, _) = market();
    let service = PortfolioService::new(config(), source);
    let q = AllocationQuery {
        risk_free_rate: Some(0.03),
        risk_aversion: Some(2.0),
        ..query(&["AAA", "BBB", "DDD"], ObjectiveKind::MaxSharpe)
    };

    let report = service.full_optimization(&q).await.unwrap();
    assert_eq!(report.risk_free_rate, 0.03);
    assert_eq!(report.risk_aversion, 2.0);
    for slot in [&report.max_sharpe, &report.min_volatility, &report.max_utility] {
        let ObjectiveSlot::Solved(allocation) = slot else {
            panic!("objective failed: {slot:?}");
        };
        assert!((allocation.weights.values().sum::<f64>() - 1.0).abs() < 1e-4);
    }

    let (ObjectiveSlot::Solved(sharpe), ObjectiveSlot::Solved(min_vol)) = (&report.max_sharpe, &report.min_volatility)
    else {
        unreachable!();
    };
    assert!(sharpe.sharpe_ratio >= min_vol.sharpe_ratio - 1e-6);
    assert!(min_vol.annual_volatility <= sharpe.annual_volatility + 1e-6);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["max_utility"]["weights"].is_object());
    assert_eq!(json["diagnostics"]["risk_method"], "sample_cov");
}

#[tokio::test]
async fn expected_returns_accepts_a_single_symbol() {
    let (source, start, end) = market();
    let service = PortfolioService::new(config(), source);

    let report = service
        .expected_returns(&symbols(&["AAA"]), start, end, ReturnsMethod::MeanHistorical)
        .await
        .unwrap();

    let closes = synthetic_closes(50.0, 0.0012, 0.02, 0.0, 120);
    let expected = (closes[119] / closes[0]).powf(252.0 / 119.0) - 1.0;
    assert_relative_eq!(report.expected_returns["AAA"], expected, max_relative = 1e-9);
    assert_eq!(report.diagnostics.symbols_used, ["AAA"]);
    assert!(report.diagnostics.risk_method.is_none());
}

#[tokio::test]
async fn inverted_window_is_an_invalid_request() {
    let (source, start, end) = market();
    let service = PortfolioService::new(config(), source);

    let err = service
        .expected_returns(&symbols(&["AAA"]), end, start, ReturnsMethod::EmaHistorical)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
}

#[tokio::test]
async fn bad_risk_aversion_fails_before_fetching() {
    let service = PortfolioService::new(config(), MemorySource::new());
    let q = AllocationQuery {
        risk_aversion: Some(0.0),
        ..query(&["AAA", "BBB"], ObjectiveKind::MaxUtility)
    };

    let err = service.optimize_allocation(&q).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidRequest(_)), "{err:?}");
}
