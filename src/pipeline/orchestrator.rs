//! Runs the five stages in dependency order and assembles the result.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, info_span, warn};

use super::stage::{ErrorRecord, Stage, StageOutcome};
use super::state::{PipelineState, TransitionError};
use super::summary::{PipelineResult, PipelineStages, PipelineSummary};
use crate::config::PlannerConfig;
use crate::error::{PipelineError, RequestError, ResourceError, StageError, ValidationError};
use crate::finance::{FinancialEngine, FinancialResult};
use crate::optimizer::{CapacityOptimizer, OptimizationResult, PlanStatus};
use crate::pue::{PuePredictor, PueProfile};
use crate::request::PipelineRequest;
use crate::resource::{InMemoryCache, ResourcePlan, ResourcePlanner, ResourceQuery};
use crate::sensitivity::{SensitivityEngine, SensitivityResult};

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Mutable bookkeeping for a single run.
struct Run {
    state: PipelineState,
    errors: Vec<ErrorRecord>,
    aborted_by: Option<Stage>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            errors: Vec::new(),
            aborted_by: None,
        }
    }

    fn enter(&mut self, next: PipelineState) -> Result<(), TransitionError> {
        self.state = self.state.advance(next)?;
        Ok(())
    }

    fn record(&mut self, stage: Stage, e: &StageError) {
        if e.is_recoverable() {
            warn!(%stage, error = %e, "recoverable stage error");
        } else {
            error!(%stage, error = %e, "fatal stage error");
        }
        self.errors.push(ErrorRecord::new(stage, e));
    }

    /// Records a stage failure; fatal errors move the run to `Failed`.
    fn fail<T>(
        &mut self,
        stage: Stage,
        e: &StageError,
        started: Instant,
    ) -> Result<StageOutcome<T>, TransitionError> {
        self.record(stage, e);
        if !e.is_recoverable() {
            self.enter(PipelineState::Failed)?;
            self.aborted_by = Some(stage);
        }
        Ok(StageOutcome::failed(e, elapsed_ms(started)))
    }
}

fn or_skip<T>(outcome: Option<StageOutcome<T>>, reason: &str) -> StageOutcome<T> {
    outcome.unwrap_or_else(|| StageOutcome::skipped(reason))
}

/// Stage outcomes filled in as the run progresses.
#[derive(Default)]
struct PartialStages {
    planner: Option<StageOutcome<ResourcePlan>>,
    optimizer: Option<StageOutcome<OptimizationResult>>,
    pue: Option<StageOutcome<PueProfile>>,
    financial: Option<StageOutcome<FinancialResult>>,
    sensitivity: Option<StageOutcome<SensitivityResult>>,
}

impl PartialStages {
    /// Stages never reached become `skipped`.
    fn finish(self, aborted_by: Option<Stage>) -> PipelineStages {
        let reason = match aborted_by {
            Some(stage) => format!("aborted after fatal error in {stage}"),
            None => "upstream stage produced no output".to_string(),
        };
        PipelineStages {
            planner: or_skip(self.planner, &reason),
            optimizer: or_skip(self.optimizer, &reason),
            pue: or_skip(self.pue, &reason),
            financial: or_skip(self.financial, &reason),
            sensitivity: or_skip(self.sensitivity, &reason),
        }
    }
}

/// Sequences resource planning, optimization, PUE forecasting, financial
/// modeling, and the optional sensitivity analysis.
pub struct Orchestrator {
    config: PlannerConfig,
    planner: ResourcePlanner,
}

impl Orchestrator {
    pub fn new(config: PlannerConfig, planner: ResourcePlanner) -> Self {
        Self { config, planner }
    }

    /// Production wiring: configured source and an in-process cache.
    ///
    /// # Errors
    ///
    /// Returns a `ResourceError` if the HTTP client cannot be built.
    pub fn from_config(config: PlannerConfig) -> Result<Self, ResourceError> {
        let planner = ResourcePlanner::from_config(&config.resource, Arc::new(InMemoryCache::new()))?;
        Ok(Self::new(config, planner))
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Runs the full pipeline for `request`.
    ///
    /// Stage failures never surface as `Err`: they are recorded in the
    /// result, and a fatal one stops the run with the remaining stages
    /// marked `skipped`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Request` if the request or configuration
    /// fails validation, before any stage runs.
    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineResult, PipelineError> {
        let mut problems: Vec<ValidationError> = request.validate();
        problems.extend(self.config.validate());
        let range = request.resolved_date_range(&self.config);
        if range.is_none() {
            problems.push(ValidationError::new(
                "resource.reference_year",
                "is not a valid calendar year",
            ));
        }
        let (Some(range), true) = (range, problems.is_empty()) else {
            return Err(RequestError::Invalid(problems).into());
        };

        let started = Instant::now();
        let _span = info_span!(
            "pipeline",
            lat = request.coordinates.latitude,
            lon = request.coordinates.longitude
        )
        .entered();

        let mut run = Run::new();
        let mut stages = PartialStages::default();
        self.execute(
            request,
            &ResourceQuery {
                coordinates: request.coordinates,
                range,
            },
            &mut run,
            &mut stages,
        )?;

        let stages = stages.finish(run.aborted_by);
        let summary = PipelineSummary::from_stages(&stages, &self.config);
        let execution_time_ms = elapsed_ms(started);
        info!(
            state = %run.state,
            errors = run.errors.len(),
            execution_time_ms,
            "pipeline finished"
        );

        Ok(PipelineResult {
            success: run.state == PipelineState::Completed,
            execution_time_ms,
            state: run.state,
            stages,
            summary,
            errors: run.errors,
        })
    }

    /// Runs stages until completion or the first fatal error.
    fn execute(
        &self,
        request: &PipelineRequest,
        query: &ResourceQuery,
        run: &mut Run,
        stages: &mut PartialStages,
    ) -> Result<(), TransitionError> {
        let cfg = &self.config;
        let discount_rate = request.discount_rate(cfg);

        // Planner never fails; a fallback is recorded as degraded data.
        run.enter(PipelineState::Planning)?;
        let t = Instant::now();
        let resource = self.planner.plan(query);
        let mut caveats = Vec::new();
        if let Some(reason) = &resource.fallback_reason {
            let e = StageError::Degraded(format!("using synthetic resource data: {reason}"));
            run.record(Stage::Planner, &e);
            caveats.push(e.to_string());
        }
        info!(
            hours = resource.series.len(),
            cache_hit = resource.cache_hit,
            "resource planning complete"
        );
        let series = resource.series.clone();
        stages.planner = Some(StageOutcome::success(resource, elapsed_ms(t), caveats));

        run.enter(PipelineState::Optimizing)?;
        let t = Instant::now();
        let optimization = match CapacityOptimizer::new(cfg.optimizer.clone()).optimize(
            &series,
            &request.current_load,
            &request.constraints,
            &request.pricing,
        ) {
            Ok(o) => o,
            Err(e) => {
                stages.optimizer = Some(run.fail(Stage::Optimizer, &e, t)?);
                return Ok(());
            }
        };
        if optimization.plan.status == PlanStatus::InfeasibleRelaxed {
            let e = StageError::Infeasible(format!(
                "target {:.2} not reachable within budget; best fraction {:.3}",
                request.constraints.target_renewable_fraction, optimization.plan.renewable_fraction
            ));
            run.record(Stage::Optimizer, &e);
        }
        let plan = optimization.plan;
        let caveats = optimization.caveats.clone();
        stages.optimizer = Some(StageOutcome::success(optimization, elapsed_ms(t), caveats));

        run.enter(PipelineState::PredictingPue)?;
        let t = Instant::now();
        let pue = match PuePredictor::new(cfg.pue.clone()).predict(&series, &request.current_load, &plan)
        {
            Ok(p) => p,
            Err(e) => {
                stages.pue = Some(run.fail(Stage::Pue, &e, t)?);
                return Ok(());
            }
        };
        stages.pue = Some(StageOutcome::success(pue.clone(), elapsed_ms(t), Vec::new()));

        run.enter(PipelineState::Financing)?;
        let t = Instant::now();
        let engine = FinancialEngine::new(cfg.optimizer.clone(), cfg.finance.clone());
        let outcome = match engine.evaluate(request, &plan, &pue, &series, discount_rate) {
            Ok(o) => o,
            Err(e) => {
                stages.financial = Some(run.fail(Stage::Financial, &e, t)?);
                return Ok(());
            }
        };
        let mut caveats = Vec::new();
        for w in &outcome.warnings {
            run.record(Stage::Financial, w);
            caveats.push(w.to_string());
        }
        let model = outcome.result.ownership.model;
        stages.financial = Some(StageOutcome::success(outcome.result, elapsed_ms(t), caveats));

        match request.sensitivity {
            Some(sensitivity) if request.wants_sensitivity() => {
                run.enter(PipelineState::Sensitivity)?;
                let t = Instant::now();
                let engine = SensitivityEngine::new(cfg.sensitivity.clone());
                stages.sensitivity = Some(match engine.run(&model, &sensitivity) {
                    Ok(r) => StageOutcome::success(r, elapsed_ms(t), Vec::new()),
                    Err(e) => run.fail(Stage::Sensitivity, &e, t)?,
                });
                if run.state == PipelineState::Failed {
                    return Ok(());
                }
            }
            _ => {
                run.enter(PipelineState::Skipped)?;
                stages.sensitivity = Some(StageOutcome::skipped("not requested"));
            }
        }

        run.enter(PipelineState::Completed)?;
        Ok(())
    }
}
