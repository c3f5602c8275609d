//! Sampled efficient frontier.
//!
//! The population is built from deterministic corner and pairwise-blend
//! seeds plus seeded random draws, every candidate checked against the
//! constraint set. The Pareto set is exact for that population, not for the
//! continuous problem: sparse or tightly constrained universes can leave gaps.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::analytics::sharpe_ratio;
use crate::analytics::statistics::return_and_volatility;
use crate::analytics::PortfolioStats;
use crate::error::EngineError;
use crate::types::{with_metadata, ComputationOutput, Percent, BOUND_TOLERANCE, Z_SCORE_95};
use crate::universe::{AssetUniverse, ConstraintSet};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Shared flag a caller can set from another thread to stop a search.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub expected_return: Percent,
    pub volatility: Percent,
    /// Percent weights summing to 100.
    pub weights: Vec<Percent>,
}

impl FrontierPoint {
    pub fn stats(&self) -> PortfolioStats {
        PortfolioStats {
            expected_return: self.expected_return,
            volatility: self.volatility,
            var5: self.expected_return - Z_SCORE_95 * self.volatility,
            total_exposure: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrontierOptions {
    pub seed: Option<u64>,
    /// Blend ratios per asset pair, inclusive of both ends.
    pub blend_steps: u32,
    /// Dirichlet-style concentration exponents, one per sampling phase.
    pub alpha_phases: Vec<f64>,
    pub cancel: Option<CancellationToken>,
    /// Draws between cancellation checks.
    pub check_every: u32,
}

impl Default for FrontierOptions {
    fn default() -> Self {
        Self {
            seed: None,
            blend_steps: 11,
            alpha_phases: vec![0.3, 0.6, 1.0, 2.5],
            cancel: None,
            check_every: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontierResult {
    pub population: Vec<FrontierPoint>,
    /// Non-dominated points, volatility ascending.
    pub pareto_frontier: Vec<FrontierPoint>,
    /// Deterministic seeds accepted.
    pub seeded: usize,
    /// Random draws accepted.
    pub sampled: usize,
    /// Seeds and draws discarded as infeasible.
    pub rejected: usize,
    /// Random draws attempted, accepted or not.
    pub drawn: usize,
    pub cancelled: bool,
}

/// Axis lengths used to normalize distances on the risk/return chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartScale {
    pub volatility_axis: Percent,
    pub return_axis: Percent,
}

impl Default for ChartScale {
    fn default() -> Self {
        Self {
            volatility_axis: 25.0,
            return_axis: 14.0,
        }
    }
}

/// Largest normalized distance at which a chart pick still snaps to a point.
pub const DEFAULT_PICK_DISTANCE: f64 = 0.08;

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Build a feasible population and extract its Pareto set.
///
/// Infeasible constraint sets yield an empty population, not an error.
pub fn frontier(
    universe: &AssetUniverse,
    sample_count: u32,
    constraints: &ConstraintSet,
    options: &FrontierOptions,
) -> EngineResult<FrontierResult> {
    let n = universe.len();
    constraints.validate(n)?;
    if options.alpha_phases.is_empty() || options.alpha_phases.iter().any(|a| !(*a > 0.0)) {
        return Err(EngineError::invalid(
            "alpha_phases",
            "must be a non-empty list of positive exponents",
        ));
    }
    if options.blend_steps < 2 {
        return Err(EngineError::invalid("blend_steps", "must be at least 2"));
    }
    if n == 0 {
        return Ok(FrontierResult::default());
    }

    let floors = constraints.floors(n);
    let caps = constraints.caps(n);
    let free: Vec<usize> = (0..n).filter(|&i| !constraints.is_fixed(i)).collect();
    let remaining = 100.0 - floors.iter().sum::<f64>();

    let mut result = FrontierResult::default();

    if remaining < -BOUND_TOLERANCE {
        tracing::debug!(remaining, "floors exceed the budget; no feasible portfolio");
        result.rejected = sample_count as usize;
        result.drawn = sample_count as usize;
        return Ok(result);
    }
    let remaining = remaining.max(0.0);

    let accept = |candidate: Vec<Percent>| -> Option<FrontierPoint> {
        let total: f64 = candidate.iter().sum();
        if !(total > 0.0) {
            return None;
        }
        let weights: Vec<Percent> = candidate.iter().map(|w| w / total * 100.0).collect();
        if !constraints.is_feasible(&weights, universe) {
            return None;
        }
        let fractions: Vec<f64> = weights.iter().map(|w| w / 100.0).collect();
        let (expected_return, volatility) = return_and_volatility(&fractions, universe);
        Some(FrontierPoint {
            expected_return,
            volatility,
            weights,
        })
    };

    // Deterministic seeds: corners of the free simplex and pairwise blends.
    let mut seeds: Vec<Vec<Percent>> = Vec::new();
    if free.is_empty() {
        seeds.push(floors.clone());
    }
    for &i in &free {
        let mut w = floors.clone();
        w[i] += remaining;
        seeds.push(w);
    }
    let last_step = (options.blend_steps - 1) as f64;
    for (k, &a) in free.iter().enumerate() {
        for &b in &free[k + 1..] {
            for step in 0..options.blend_steps {
                let t = step as f64 / last_step;
                let mut w = floors.clone();
                w[a] += t * remaining;
                w[b] += (1.0 - t) * remaining;
                seeds.push(w);
            }
        }
    }
    for seed in seeds {
        match accept(seed) {
            Some(point) => {
                result.population.push(point);
                result.seeded += 1;
            }
            None => result.rejected += 1,
        }
    }

    // Random draws
    let mut rng = match options.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let has_floors = constraints.has_floors();
    let headroom: Vec<usize> = free
        .iter()
        .copied()
        .filter(|&i| caps[i] - floors[i] > BOUND_TOLERANCE)
        .collect();
    let phases = options.alpha_phases.len();
    let check_every = options.check_every.max(1);

    for k in 0..sample_count {
        if k % check_every == 0 {
            if let Some(token) = &options.cancel {
                if token.is_cancelled() {
                    result.cancelled = true;
                    break;
                }
            }
        }

        result.drawn += 1;
        let candidate = if has_floors {
            let phase = (k as usize * phases) / sample_count as usize;
            let alpha = options.alpha_phases[phase.min(phases - 1)];
            let draws: Vec<f64> = headroom
                .iter()
                .map(|_| rng.gen::<f64>().powf(1.0 / alpha))
                .collect();
            let sum: f64 = draws.iter().sum();
            let mut w = floors.clone();
            if sum > 0.0 {
                for (&i, d) in headroom.iter().zip(&draws) {
                    w[i] += remaining * d / sum;
                }
            }
            w
        } else {
            let mut w = vec![0.0; n];
            for &i in &free {
                w[i] = rng.gen::<f64>();
            }
            w
        };

        match accept(candidate) {
            Some(point) => {
                result.population.push(point);
                result.sampled += 1;
            }
            None => result.rejected += 1,
        }
    }

    if result.cancelled {
        tracing::warn!(
            drawn = result.drawn,
            requested = sample_count,
            "frontier search cancelled"
        );
    }

    result.pareto_frontier = pareto_frontier(&result.population);
    tracing::debug!(
        seeded = result.seeded,
        sampled = result.sampled,
        rejected = result.rejected,
        pareto = result.pareto_frontier.len(),
        "frontier population built"
    );
    Ok(result)
}

/// Points no other point beats on both return and volatility, volatility
/// ascending.
pub fn pareto_frontier(population: &[FrontierPoint]) -> Vec<FrontierPoint> {
    let mut sorted: Vec<&FrontierPoint> = population.iter().collect();
    sorted.sort_by(|a, b| {
        a.volatility
            .total_cmp(&b.volatility)
            .then(b.expected_return.total_cmp(&a.expected_return))
    });
    let mut best = f64::NEG_INFINITY;
    let mut out = Vec::new();
    for p in sorted {
        if p.expected_return > best {
            best = p.expected_return;
            out.push(p.clone());
        }
    }
    out
}

/// Highest-return point per volatility bin, sorted by volatility.
///
/// Lossy: a display curve, not a frontier. Bins are `round(vol / width)`.
pub fn bucket_frontier(points: &[FrontierPoint], bin_width: f64) -> EngineResult<Vec<FrontierPoint>> {
    if !(bin_width > 0.0) {
        return Err(EngineError::invalid("bin_width", "must be positive"));
    }
    let mut bins: BTreeMap<i64, &FrontierPoint> = BTreeMap::new();
    for p in points {
        let key = (p.volatility / bin_width).round() as i64;
        match bins.get(&key) {
            Some(existing) if existing.expected_return >= p.expected_return => {}
            _ => {
                bins.insert(key, p);
            }
        }
    }
    let mut curve: Vec<FrontierPoint> = bins.into_values().cloned().collect();
    curve.sort_by(|a, b| a.volatility.total_cmp(&b.volatility));
    Ok(curve)
}

/// Curve point closest to `(volatility, expected_return)` in axis-normalized
/// distance, if within `max_distance`.
pub fn nearest_point<'a>(
    curve: &'a [FrontierPoint],
    volatility: Percent,
    expected_return: Percent,
    scale: ChartScale,
    max_distance: f64,
) -> Option<&'a FrontierPoint> {
    curve
        .iter()
        .map(|p| {
            let dv = (p.volatility - volatility) / scale.volatility_axis;
            let dr = (p.expected_return - expected_return) / scale.return_axis;
            (p, (dv * dv + dr * dr).sqrt())
        })
        .filter(|(_, d)| *d < max_distance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

// ---------------------------------------------------------------------------
// Wrapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierInput {
    pub universe: AssetUniverse,
    #[serde(default)]
    pub constraints: ConstraintSet,
    #[serde(default = "crate::config::default_frontier_samples")]
    pub sample_count: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "crate::config::default_frontier_bin_width")]
    pub bin_width: f64,
    #[serde(default = "crate::config::default_blend_steps")]
    pub blend_steps: u32,
    #[serde(default = "crate::config::default_risk_free_rate")]
    pub risk_free_rate: Percent,
    /// Return every accepted candidate, not just the Pareto set and curve.
    #[serde(default)]
    pub include_population: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierOutput {
    pub population_size: usize,
    pub seeded: usize,
    pub sampled: usize,
    pub rejected: usize,
    pub cancelled: bool,
    pub pareto_frontier: Vec<FrontierPoint>,
    /// Bucketed display curve.
    pub curve: Vec<FrontierPoint>,
    pub max_sharpe: Option<FrontierPoint>,
    pub min_volatility: Option<FrontierPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<Vec<FrontierPoint>>,
}

/// Run a frontier search and summarize it for display.
pub fn search_frontier(input: &FrontierInput) -> EngineResult<ComputationOutput<FrontierOutput>> {
    search_frontier_with_cancel(input, None)
}

/// [`search_frontier`] that a caller can stop early through `cancel`.
pub fn search_frontier_with_cancel(
    input: &FrontierInput,
    cancel: Option<CancellationToken>,
) -> EngineResult<ComputationOutput<FrontierOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let options = FrontierOptions {
        seed: input.seed,
        blend_steps: input.blend_steps,
        cancel,
        ..FrontierOptions::default()
    };
    let result = frontier(&input.universe, input.sample_count, &input.constraints, &options)?;
    let curve = bucket_frontier(&result.pareto_frontier, input.bin_width)?;

    if result.population.is_empty() {
        warnings.push("No feasible portfolio satisfies the constraints".into());
    } else if result.rejected > 0 {
        let attempted = result.rejected + result.seeded + result.sampled;
        let rate = result.rejected as f64 / attempted as f64;
        if rate > 0.9 {
            warnings.push(format!(
                "{:.1}% of candidates rejected as infeasible; the frontier may be sparse",
                rate * 100.0
            ));
        }
    }
    if result.cancelled {
        warnings.push(format!(
            "Search cancelled after {} of {} draws",
            result.drawn, input.sample_count
        ));
    }

    let rf = input.risk_free_rate;
    let max_sharpe = result
        .pareto_frontier
        .iter()
        .max_by(|a, b| sharpe_ratio(&a.stats(), rf).total_cmp(&sharpe_ratio(&b.stats(), rf)))
        .cloned();
    let min_volatility = result.pareto_frontier.first().cloned();

    let output = FrontierOutput {
        population_size: result.population.len(),
        seeded: result.seeded,
        sampled: result.sampled,
        rejected: result.rejected,
        cancelled: result.cancelled,
        curve,
        max_sharpe,
        min_volatility,
        population: input.include_population.then(|| result.population.clone()),
        pareto_frontier: result.pareto_frontier,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Sampled efficient frontier (seeded corners and blends plus Monte Carlo draws, Pareto filter)",
        &serde_json::json!({
            "sample_count": input.sample_count,
            "seed": input.seed,
            "bin_width": input.bin_width,
            "blend_steps": input.blend_steps,
            "risk_free_rate": input.risk_free_rate,
            "alpha_phases": options.alpha_phases,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{default_universe, Asset, Constraint, CorrelationMatrix};
    use pretty_assertions::assert_eq;

    fn options(seed: u64) -> FrontierOptions {
        FrontierOptions {
            seed: Some(seed),
            ..FrontierOptions::default()
        }
    }

    fn point(vol: f64, ret: f64) -> FrontierPoint {
        FrontierPoint {
            expected_return: ret,
            volatility: vol,
            weights: vec![],
        }
    }

    #[test]
    fn test_unconstrained_population_is_feasible() {
        let u = default_universe();
        let c = ConstraintSet::new();
        let res = frontier(&u, 2_000, &c, &options(7)).unwrap();
        // 7 corners + 21 pairs * 11 blends
        assert_eq!(res.seeded, 7 + 21 * 11);
        assert_eq!(res.sampled, 2_000);
        for p in &res.population {
            assert!((p.weights.iter().sum::<f64>() - 100.0).abs() < 1e-9);
        }
        assert!(!res.pareto_frontier.is_empty());
    }

    #[test]
    fn test_pareto_is_monotone() {
        let u = default_universe();
        let res = frontier(&u, 3_000, &ConstraintSet::new(), &options(11)).unwrap();
        for pair in res.pareto_frontier.windows(2) {
            assert!(pair[1].volatility >= pair[0].volatility);
            assert!(pair[1].expected_return > pair[0].expected_return);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let u = default_universe();
        let c = ConstraintSet::new().with(2, Constraint::Min { min: 20.0 });
        let a = frontier(&u, 500, &c, &options(3)).unwrap();
        let b = frontier(&u, 500, &c, &options(3)).unwrap();
        assert_eq!(a.population, b.population);
    }

    #[test]
    fn test_constrained_candidates_respect_bounds() {
        let u = default_universe();
        let c = ConstraintSet::new()
            .with(0, Constraint::Fixed { value: 5.0 })
            .with(2, Constraint::Range { min: 20.0, max: 50.0 })
            .with_liquidity_cap(20.0);
        let res = frontier(&u, 2_000, &c, &options(5)).unwrap();
        assert!(!res.population.is_empty());
        for p in &res.population {
            assert!(c.is_feasible(&p.weights, &u));
        }
    }

    #[test]
    fn test_fixed_over_budget_gives_empty_population() {
        let u = default_universe();
        let c = ConstraintSet::new()
            .with(0, Constraint::Fixed { value: 60.0 })
            .with(1, Constraint::Fixed { value: 50.0 });
        let res = frontier(&u, 1_000, &c, &options(1)).unwrap();
        assert!(res.population.is_empty());
        assert!(res.pareto_frontier.is_empty());
        assert_eq!(res.rejected, 1_000);
    }

    #[test]
    fn test_pre_cancelled_search_keeps_seeds() {
        let token = CancellationToken::new();
        token.cancel();
        let opts = FrontierOptions {
            cancel: Some(token),
            ..options(9)
        };
        let res = frontier(&default_universe(), 10_000, &ConstraintSet::new(), &opts).unwrap();
        assert!(res.cancelled);
        assert_eq!(res.sampled, 0);
        assert_eq!(res.drawn, 0);
        assert!(res.seeded > 0);
    }

    #[test]
    fn test_pareto_ties_prefer_higher_return() {
        let pop = vec![point(5.0, 4.0), point(5.0, 6.0), point(4.0, 5.0), point(6.0, 5.5)];
        let front = pareto_frontier(&pop);
        let coords: Vec<(f64, f64)> = front.iter().map(|p| (p.volatility, p.expected_return)).collect();
        assert_eq!(coords, vec![(4.0, 5.0), (5.0, 6.0)]);
    }

    #[test]
    fn test_bucketing_keeps_best_per_bin() {
        let pts = vec![point(5.1, 6.0), point(4.9, 6.5), point(7.0, 7.0), point(6.8, 6.9)];
        let curve = bucket_frontier(&pts, 0.5).unwrap();
        let coords: Vec<(f64, f64)> = curve.iter().map(|p| (p.volatility, p.expected_return)).collect();
        assert_eq!(coords, vec![(4.9, 6.5), (7.0, 7.0)]);
        assert!(bucket_frontier(&pts, 0.0).is_err());
    }

    #[test]
    fn test_nearest_point_threshold() {
        let curve = vec![point(5.0, 6.0), point(10.0, 8.0)];
        let hit = nearest_point(&curve, 9.5, 8.2, ChartScale::default(), DEFAULT_PICK_DISTANCE);
        assert_eq!(hit.map(|p| p.volatility), Some(10.0));
        let miss = nearest_point(&curve, 20.0, 1.0, ChartScale::default(), DEFAULT_PICK_DISTANCE);
        assert!(miss.is_none());
    }

    #[test]
    fn test_zero_vol_universe_does_not_nan() {
        let u = AssetUniverse::new(
            vec![Asset::new("a", 3.0, 0.0, true), Asset::new("b", 4.0, 0.0, true)],
            CorrelationMatrix::identity(2),
        )
        .unwrap();
        let res = frontier(&u, 100, &ConstraintSet::new(), &options(2)).unwrap();
        assert!(res.population.iter().all(|p| p.volatility == 0.0));
    }

    #[test]
    fn test_search_frontier_wrapper() {
        let input: FrontierInput = serde_json::from_value(serde_json::json!({
            "universe": default_universe(),
            "sample_count": 1000,
            "seed": 42,
        }))
        .unwrap();
        let out = search_frontier(&input).unwrap();
        assert!(out.result.max_sharpe.is_some());
        let min_vol = out.result.min_volatility.unwrap();
        assert_eq!(min_vol, out.result.pareto_frontier[0]);
        assert!(out.result.population.is_none());
        assert!(out.result.curve.len() <= out.result.pareto_frontier.len());
    }
}
