//! Capacity sizing by greedy allocation and local search.
//!
//! Capacities are searched in whole kW (solar, wind) and kWh (battery).
//! Greedy allocation adds the step with the best marginal renewable
//! fraction per dollar until the target is met or the budget runs out.
//! Local search then tries add, remove, and swap moves with a shrinking
//! step, keeping any candidate that ranks better (see [`Candidate::beats`]).
//! Every candidate the search considers respects caps and budget.

use std::time::Instant;

use tracing::{debug, info};

use super::dispatch::{CapacityFactors, Capacities, DispatchParams, DispatchSummary, simulate};
use super::plan::{CapacityPlan, OptimizationResult, PlanStatus, SolverDiagnostics, capital_cost};
use crate::config::OptimizerConfig;
use crate::error::StageError;
use crate::request::{Constraints, LoadProfile, PricingConfig};
use crate::resource::ResourceSeries;

const STRATEGY: &str = "greedy-local-search";
const TARGET_TOLERANCE: f64 = 1e-9;
const COST_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tech {
    Solar,
    Wind,
    Battery,
}

impl Tech {
    const ALL: [Tech; 3] = [Tech::Solar, Tech::Wind, Tech::Battery];

    fn get(self, c: &Capacities) -> f64 {
        match self {
            Tech::Solar => c.solar_kw,
            Tech::Wind => c.wind_kw,
            Tech::Battery => c.battery_kwh,
        }
    }

    fn with(self, c: Capacities, value: f64) -> Capacities {
        match self {
            Tech::Solar => Capacities { solar_kw: value, ..c },
            Tech::Wind => Capacities { wind_kw: value, ..c },
            Tech::Battery => Capacities {
                battery_kwh: value,
                ..c
            },
        }
    }

    fn unit_cost(self, p: &PricingConfig) -> f64 {
        match self {
            Tech::Solar => p.solar_capex_usd_per_kw,
            Tech::Wind => p.wind_capex_usd_per_kw,
            Tech::Battery => p.battery_capex_usd_per_kwh,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    caps: Capacities,
    cost: f64,
    dispatch: DispatchSummary,
}

impl Candidate {
    fn fraction(&self) -> f64 {
        self.dispatch.renewable_fraction
    }

    fn meets(&self, target: f64) -> bool {
        self.fraction() + TARGET_TOLERANCE >= target
    }

    /// Ranking: meeting the target beats missing it; among plans that meet
    /// it, cheaper wins; among plans that miss, higher fraction wins and
    /// cost breaks ties.
    fn beats(&self, other: &Candidate, target: f64) -> bool {
        match (self.meets(target), other.meets(target)) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => self.cost < other.cost - COST_TOLERANCE,
            (false, false) => {
                let df = self.fraction() - other.fraction();
                df > TARGET_TOLERANCE
                    || (df.abs() <= TARGET_TOLERANCE && self.cost < other.cost - COST_TOLERANCE)
            }
        }
    }
}

/// Evaluates candidates and counts the dispatch runs.
struct Evaluator<'a> {
    factors: &'a CapacityFactors,
    load_kw: &'a [f64],
    params: DispatchParams,
    pricing: &'a PricingConfig,
    evaluations: usize,
}

impl Evaluator<'_> {
    fn eval(&mut self, caps: Capacities) -> Candidate {
        self.evaluations += 1;
        Candidate {
            caps,
            cost: capital_cost(&caps, self.pricing),
            dispatch: simulate(self.factors, self.load_kw, &caps, &self.params),
        }
    }
}

/// Sizes solar, wind, and battery capacity for a renewable target.
#[derive(Debug, Clone, Default)]
pub struct CapacityOptimizer {
    config: OptimizerConfig,
}

impl CapacityOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Facility load per hour of the series: IT load times baseline PUE.
    pub fn facility_load(series: &ResourceSeries, load: &LoadProfile) -> Vec<f64> {
        series
            .hours_of_day()
            .map(|h| load.it_load_kw(h) * load.current_pue)
            .collect()
    }

    /// Finds the cheapest plan meeting the target within budget and caps.
    ///
    /// When no such plan exists, returns the plan with the best achievable
    /// fraction within budget and marks it `infeasible-relaxed`.
    ///
    /// # Errors
    ///
    /// Returns `StageError::MalformedData` if the resource series is empty.
    pub fn optimize(
        &self,
        series: &ResourceSeries,
        load: &LoadProfile,
        constraints: &Constraints,
        pricing: &PricingConfig,
    ) -> Result<OptimizationResult, StageError> {
        let started = Instant::now();
        if series.is_empty() {
            return Err(StageError::MalformedData(
                "resource series has no hourly records".to_string(),
            ));
        }

        let factors = CapacityFactors::from_series(series, &self.config);
        let load_kw = Self::facility_load(series, load);
        let mut evaluator = Evaluator {
            factors: &factors,
            load_kw: &load_kw,
            params: DispatchParams::from(&self.config),
            pricing,
            evaluations: 0,
        };

        let target = constraints.target_renewable_fraction;
        let zero = evaluator.eval(Capacities::default());

        if target <= 0.0 {
            return Ok(OptimizationResult {
                plan: plan_from(&zero, PlanStatus::ZeroBuild),
                dispatch: zero.dispatch,
                diagnostics: SolverDiagnostics {
                    strategy: "zero-build".to_string(),
                    solve_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                    evaluations: evaluator.evaluations,
                    iterations: 0,
                    mean_solar_capacity_factor: factors.mean_solar(),
                    mean_wind_capacity_factor: factors.mean_wind(),
                },
                caveats: Vec::new(),
            });
        }

        let limits = self.limits(constraints, pricing);
        let mean_load = load_kw.iter().sum::<f64>() / load_kw.len() as f64;
        let step = (mean_load / 10.0).round().max(1.0);

        let mut iterations = 0;
        let greedy = self.greedy(
            &mut evaluator,
            zero,
            target,
            constraints.budget,
            &limits,
            step,
            &mut iterations,
        );
        debug!(
            fraction = greedy.fraction(),
            cost = greedy.cost,
            "greedy allocation finished"
        );
        let best = self.local_search(
            &mut evaluator,
            greedy,
            target,
            constraints.budget,
            &limits,
            step,
            &mut iterations,
        );

        let status = if best.meets(target) {
            PlanStatus::TargetMet
        } else {
            PlanStatus::InfeasibleRelaxed
        };
        let mut caveats = Vec::new();
        if status == PlanStatus::InfeasibleRelaxed {
            caveats.push(format!(
                "target renewable fraction {:.3} is not reachable within budget ${:.0}; \
                 best achievable is {:.3}",
                target,
                constraints.budget,
                best.fraction()
            ));
        }

        let solve_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            solar_kw = best.caps.solar_kw,
            wind_kw = best.caps.wind_kw,
            battery_kwh = best.caps.battery_kwh,
            fraction = best.fraction(),
            cost = best.cost,
            %status,
            evaluations = evaluator.evaluations,
            solve_time_ms,
            "capacity plan selected"
        );

        Ok(OptimizationResult {
            plan: plan_from(&best, status),
            dispatch: best.dispatch,
            diagnostics: SolverDiagnostics {
                strategy: STRATEGY.to_string(),
                solve_time_ms,
                evaluations: evaluator.evaluations,
                iterations,
                mean_solar_capacity_factor: factors.mean_solar(),
                mean_wind_capacity_factor: factors.mean_wind(),
            },
            caveats,
        })
    }

    /// Whole-unit upper bound per technology from caps and budget.
    fn limits(&self, constraints: &Constraints, pricing: &PricingConfig) -> [f64; 3] {
        Tech::ALL.map(|tech| {
            let cap = match tech {
                Tech::Solar => constraints.max_solar_kw,
                Tech::Wind => constraints.max_wind_kw,
                Tech::Battery => constraints.max_battery_kwh,
            }
            .unwrap_or(f64::INFINITY);
            let affordable = constraints.budget / tech.unit_cost(pricing);
            cap.min(affordable).max(0.0).floor()
        })
    }

    /// Step for a technology; battery steps in kWh so their power rating
    /// matches a generation step.
    fn unit(&self, tech: Tech, step: f64) -> f64 {
        match tech {
            Tech::Battery => (step * self.config.battery_duration_hours).round().max(1.0),
            _ => step,
        }
    }

    #[expect(clippy::too_many_arguments)]
    fn greedy(
        &self,
        evaluator: &mut Evaluator<'_>,
        start: Candidate,
        target: f64,
        budget: f64,
        limits: &[f64; 3],
        step: f64,
        iterations: &mut usize,
    ) -> Candidate {
        let mut current = start;
        while !current.meets(target) && *iterations < self.config.max_iterations {
            *iterations += 1;
            let mut best: Option<(f64, Candidate)> = None;

            for (i, tech) in Tech::ALL.into_iter().enumerate() {
                let have = tech.get(&current.caps);
                let affordable = ((budget - current.cost) / tech.unit_cost(evaluator.pricing)).floor();
                let amount = self.unit(tech, step).min(limits[i] - have).min(affordable);
                if amount < 1.0 {
                    continue;
                }

                let cand = evaluator.eval(tech.with(current.caps, have + amount));
                let gain = cand.fraction() - current.fraction();
                if gain <= 0.0 {
                    continue;
                }
                let score = gain / (cand.cost - current.cost);
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((score, cand));
                }
            }

            match best {
                Some((_, cand)) => current = cand,
                None => break,
            }
        }
        current
    }

    #[expect(clippy::too_many_arguments)]
    fn local_search(
        &self,
        evaluator: &mut Evaluator<'_>,
        start: Candidate,
        target: f64,
        budget: f64,
        limits: &[f64; 3],
        initial_step: f64,
        iterations: &mut usize,
    ) -> Candidate {
        let mut current = start;
        let mut step = initial_step;

        while step >= 1.0 {
            loop {
                if *iterations >= self.config.max_iterations {
                    return current;
                }
                *iterations += 1;

                let mut best = current;
                for moved in self.neighbours(&current.caps, step) {
                    let within_limits = Tech::ALL
                        .iter()
                        .enumerate()
                        .all(|(i, t)| (0.0..=limits[i]).contains(&t.get(&moved)));
                    if !within_limits || capital_cost(&moved, evaluator.pricing) > budget {
                        continue;
                    }
                    let cand = evaluator.eval(moved);
                    if cand.beats(&best, target) {
                        best = cand;
                    }
                }

                if best.caps == current.caps {
                    break;
                }
                current = best;
            }
            step = (step / 2.0).floor();
        }
        current
    }

    /// Add, remove, and swap moves around `caps`.
    fn neighbours(&self, caps: &Capacities, step: f64) -> Vec<Capacities> {
        let mut out = Vec::with_capacity(12);
        for tech in Tech::ALL {
            let have = tech.get(caps);
            let unit = self.unit(tech, step);
            out.push(tech.with(*caps, have + unit));
            out.push(tech.with(*caps, have - unit));
        }
        for from in Tech::ALL {
            for to in Tech::ALL {
                if from == to {
                    continue;
                }
                let reduced = from.with(*caps, from.get(caps) - self.unit(from, step));
                out.push(to.with(reduced, to.get(&reduced) + self.unit(to, step)));
            }
        }
        out
    }
}

fn plan_from(c: &Candidate, status: PlanStatus) -> CapacityPlan {
    CapacityPlan {
        solar_kw: c.caps.solar_kw,
        wind_kw: c.caps.wind_kw,
        battery_kwh: c.caps.battery_kwh,
        renewable_fraction: c.fraction(),
        total_cost_usd: c.cost,
        status,
    }
}
