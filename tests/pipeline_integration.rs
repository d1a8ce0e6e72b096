//! End-to-end tests for the planning pipeline.

mod common;

use renewable_planner::error::{PipelineError, RequestError};
use renewable_planner::finance::FinancingOption;
use renewable_planner::optimizer::PlanStatus;
use renewable_planner::pipeline::{PipelineResult, PipelineState, Stage, StageOutcome};
use renewable_planner::request::{PipelineRequest, SensitivityConfig, VppaConfig};
use renewable_planner::resource::Provenance;
use renewable_planner::sensitivity::SensitivityResult;

fn run(request: &PipelineRequest) -> PipelineResult {
    common::offline_orchestrator()
        .run(request)
        .expect("request should be valid")
}

fn sensitivity(result: &PipelineResult) -> &SensitivityResult {
    result
        .stages
        .sensitivity
        .payload()
        .expect("sensitivity should have run")
}

fn with_iterations(iterations: usize, seed: u64) -> PipelineRequest {
    PipelineRequest {
        sensitivity: Some(SensitivityConfig {
            iterations,
            seed: Some(seed),
            ..SensitivityConfig::default()
        }),
        ..common::scenario_a()
    }
}

#[test]
fn scenario_a_produces_a_plan_and_payback() {
    let result = run(&common::scenario_a());
    assert!(result.success);
    assert_eq!(result.state, PipelineState::Completed);
    assert!(!result.has_fatal_error());

    let plan = result.summary.optimal_plan.expect("plan should be present");
    assert!(plan.solar_kw >= 0.0);
    assert!(plan.wind_kw >= 0.0);
    assert!(plan.battery_kwh >= 0.0);

    let best = result.summary.financial_best_case.expect("financials present");
    assert_eq!(best.source, FinancingOption::Ownership);
    assert!(best.payback_months.expect("ownership payback") > 0.0);

    assert!(result.stages.planner.is_success());
    assert!(result.stages.optimizer.is_success());
    assert!(result.stages.pue.is_success());
    assert!(result.stages.financial.is_success());
    assert!(result.stages.sensitivity.is_success());
    assert!(result.summary.risk_profile.is_some());
    assert!(result.execution_time_ms >= 0.0);
}

#[test]
fn plan_respects_caps_and_budget() {
    let request = PipelineRequest {
        date_range: Some(common::short_range()),
        sensitivity: None,
        ..PipelineRequest::hot_climate()
    };
    let result = run(&request);
    let plan = result.summary.optimal_plan.unwrap();
    let caps = &request.constraints;
    assert!(plan.solar_kw <= caps.max_solar_kw.unwrap());
    assert!(plan.wind_kw <= caps.max_wind_kw.unwrap());
    assert!(plan.battery_kwh <= caps.max_battery_kwh.unwrap());
    if plan.status != PlanStatus::InfeasibleRelaxed {
        assert!(plan.total_cost_usd <= caps.budget);
    }
}

#[test]
fn infeasible_target_is_relaxed_not_failed() {
    let mut request = common::scenario_a();
    request.constraints.budget = 50_000.0;
    request.constraints.target_renewable_fraction = 1.0;
    let result = run(&request);
    assert!(result.success);
    let plan = result.summary.optimal_plan.unwrap();
    assert_eq!(plan.status, PlanStatus::InfeasibleRelaxed);
    assert!(plan.total_cost_usd <= 50_000.0);
    assert!(
        result
            .errors
            .iter()
            .any(|e| e.stage == Stage::Optimizer && e.recoverable)
    );
}

#[test]
fn scenario_b_forward_curve_drives_settlement() {
    let request = PipelineRequest {
        vppa: Some(VppaConfig {
            consider_vppa: true,
            strike_price: 95.0,
            contract_duration: 10,
            forward_curve: Some(vec![
                90.0, 92.0, 94.0, 96.0, 98.0, 100.0, 102.0, 104.0, 106.0, 108.0,
            ]),
            contracted_volume_mwh: None,
        }),
        sensitivity: None,
        ..common::scenario_a()
    };
    let result = run(&request);
    assert!(result.success);

    let financial = result.stages.financial.payload().unwrap();
    let vppa = financial.vppa.as_ref().expect("VPPA analysis present");
    let flows = &vppa.annual_cash_flows;
    assert_eq!(flows.len(), 10);
    assert_eq!(flows[0].market_price, 90.0);
    assert_eq!(flows[1].market_price, 92.0);
    assert_eq!(flows[2].market_price, 94.0);
    assert!(vppa.volume_mwh > 0.0);
}

#[test]
fn short_forward_curve_holds_last_price() {
    let request = PipelineRequest {
        date_range: Some(common::short_range()),
        ..PipelineRequest::vppa_hedge()
    };
    let result = run(&request);
    let vppa = result.stages.financial.payload().unwrap().vppa.clone().unwrap();
    assert_eq!(vppa.annual_cash_flows[7].market_price, 108.0);
    assert_eq!(vppa.annual_cash_flows[9].market_price, 108.0);
}

#[test]
fn scenario_c_zero_resource_falls_back_to_synthetic() {
    let result = common::orchestrator_with(common::ZeroSource)
        .run(&common::scenario_a())
        .unwrap();
    assert!(result.success);

    let plan = result.stages.planner.payload().unwrap();
    assert_eq!(plan.series.provenance.solar, Provenance::Synthetic);
    assert_eq!(plan.series.provenance.wind, Provenance::Synthetic);
    assert!(plan.fallback_reason.is_some());
    assert!(
        result
            .errors
            .iter()
            .any(|e| e.stage == Stage::Planner && e.recoverable)
    );
}

#[test]
fn unreachable_source_still_completes() {
    let result = common::unreachable_orchestrator()
        .run(&common::scenario_a())
        .unwrap();
    assert!(result.success);
    let plan = result.stages.planner.payload().unwrap();
    assert_eq!(plan.series.source, "synthetic");
    assert!(!plan.cache_hit);
}

#[test]
fn cache_outage_is_silent() {
    let result = common::cache_down_orchestrator(common::SteadySource)
        .run(&common::scenario_a())
        .unwrap();
    assert!(result.success);

    let plan = result.stages.planner.payload().unwrap();
    assert_eq!(plan.series.provenance.solar, Provenance::Api);
    assert_eq!(plan.series.provenance.wind, Provenance::Api);
    assert_eq!(plan.series.source, "steady");
    assert!(!plan.cache_hit);
    assert!(plan.fallback_reason.is_none());
    assert!(result.errors.iter().all(|e| e.stage != Stage::Planner));
}

#[test]
fn zero_target_builds_nothing() {
    let mut request = common::scenario_a();
    request.constraints.target_renewable_fraction = 0.0;
    let result = run(&request);
    assert!(result.success);
    let plan = result.summary.optimal_plan.unwrap();
    assert_eq!(plan.solar_kw, 0.0);
    assert_eq!(plan.wind_kw, 0.0);
    assert_eq!(plan.battery_kwh, 0.0);
    assert_eq!(plan.total_cost_usd, 0.0);
    assert_eq!(plan.status, PlanStatus::ZeroBuild);
}

#[test]
fn fatal_financial_error_skips_sensitivity_and_keeps_earlier_stages() {
    let healthy = run(&common::scenario_a());

    let mut request = common::scenario_a();
    request.pricing.electricity_usd_per_kwh = 1e308;
    let result = run(&request);

    assert!(!result.success);
    assert_eq!(result.state, PipelineState::Failed);
    assert!(result.has_fatal_error());
    match &result.stages.financial {
        StageOutcome::Failed { recoverable, .. } => assert!(!recoverable),
        other => panic!("financial stage should fail, got {}", other.status()),
    }
    assert!(result.stages.sensitivity.is_skipped());

    assert_eq!(
        result.stages.planner.payload(),
        healthy.stages.planner.payload()
    );
    assert_eq!(
        result.stages.optimizer.payload().map(|o| o.plan),
        healthy.stages.optimizer.payload().map(|o| o.plan)
    );
    assert_eq!(
        result.stages.pue.payload(),
        healthy.stages.pue.payload()
    );
    assert!(result.summary.optimal_plan.is_some());
    assert!(result.summary.financial_best_case.is_none());
    assert!(result.summary.risk_profile.is_none());
}

#[test]
fn sensitivity_not_requested_is_skipped_not_failed() {
    let request = PipelineRequest {
        sensitivity: None,
        ..common::scenario_a()
    };
    let result = run(&request);
    assert!(result.success);
    assert_eq!(
        result.stages.sensitivity,
        StageOutcome::skipped("not requested")
    );
    assert!(result.summary.risk_profile.is_none());
    assert!(result.errors.iter().all(|e| e.stage != Stage::Sensitivity));
}

#[test]
fn fixed_seed_is_idempotent() {
    let request = with_iterations(300, 2024);
    let a = run(&request);
    let b = run(&request);
    assert_eq!(sensitivity(&a), sensitivity(&b));
    assert_eq!(a.summary.risk_profile, b.summary.risk_profile);
}

#[test]
fn more_iterations_give_tighter_estimates() {
    let coarse = run(&with_iterations(50, 9));
    let fine = run(&with_iterations(1500, 9));
    assert!(sensitivity(&fine).npv.standard_error < sensitivity(&coarse).npv.standard_error);
    assert_eq!(sensitivity(&fine).iterations, 1500);
}

#[test]
fn result_serializes_with_wire_names() {
    let request = PipelineRequest {
        sensitivity: None,
        ..common::scenario_a()
    };
    let json = serde_json::to_value(run(&request)).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["executionTimeMs"].is_number());
    assert_eq!(json["state"], "completed");
    assert_eq!(json["stages"]["planner"]["status"], "success");
    assert_eq!(json["stages"]["sensitivity"]["status"], "skipped");
    assert!(json["summary"]["optimal_plan"]["solar_kw"].is_number());
    assert!(json["summary"]["environmental"]["equivalent_cars_removed"].is_number());
    assert!(json["summary"].get("risk_profile").is_none());
}

#[test]
fn invalid_request_is_rejected_before_any_stage() {
    let mut request = common::scenario_a();
    request.coordinates.longitude = 200.0;
    let err = common::offline_orchestrator().run(&request).unwrap_err();
    match err {
        PipelineError::Request(RequestError::Invalid(errors)) => {
            assert_eq!(errors[0].field, "coordinates.longitude");
        }
        other => panic!("unexpected error: {other}"),
    }
}
