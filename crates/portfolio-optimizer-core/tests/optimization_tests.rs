use approx::assert_relative_eq;
use portfolio_optimizer_core::optimization::{
    apply_shortcut, bucket_frontier, erc_weights, frontier, search_frontier, solve_erc,
    CancellationToken, ErcInput, FrontierInput, FrontierOptions, RiskParitySolver,
    ShortcutInput, ShortcutMethod,
};
use portfolio_optimizer_core::universe::{
    default_universe, Asset, AssetUniverse, Constraint, ConstraintSet, CorrelationMatrix,
};
use portfolio_optimizer_core::EngineConfig;
use pretty_assertions::assert_eq;

fn seeded(seed: u64) -> FrontierOptions {
    FrontierOptions {
        seed: Some(seed),
        ..FrontierOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Equal risk contribution
// ---------------------------------------------------------------------------

#[test]
fn test_erc_two_assets_is_two_thirds_one_third() {
    let u = AssetUniverse::new(
        vec![
            Asset::new("bonds", 5.0, 10.0, true),
            Asset::new("stocks", 9.0, 20.0, true),
        ],
        CorrelationMatrix::identity(2),
    )
    .unwrap();
    let w = erc_weights(&u, &[]).unwrap();
    assert_relative_eq!(w[0], 2.0 / 3.0, epsilon = 1e-6);
    assert_relative_eq!(w[1], 1.0 / 3.0, epsilon = 1e-6);
}

#[test]
fn test_erc_equalizes_risk_on_default_universe() {
    let u = default_universe();
    let sol = RiskParitySolver::from_config(&EngineConfig::default())
        .solve(&u, &[0])
        .unwrap();
    assert!(sol.converged);
    let included: Vec<f64> = sol.risk_contributions.iter().skip(1).copied().collect();
    let first = included[0];
    for rc in included {
        assert_relative_eq!(rc, first, epsilon = 1e-4);
    }
}

#[test]
fn test_solve_erc_display_weights_rounded() {
    let input = ErcInput {
        universe: default_universe(),
        exclude_ids: vec!["cash".into()],
        solver: RiskParitySolver::default(),
    };
    let out = solve_erc(&input).unwrap();
    for w in &out.result.display_weights {
        assert_relative_eq!(w * 10.0, (w * 10.0).round(), epsilon = 1e-9);
    }
    let rc_sum: f64 = out.result.risk_budget.iter().map(|r| r.pct_of_risk).sum();
    assert_relative_eq!(rc_sum, 100.0, epsilon = 1e-6);
}

#[test]
fn test_wrapper_defaults_follow_engine_config() {
    let cfg = EngineConfig::default();
    let erc: ErcInput =
        serde_json::from_value(serde_json::json!({ "universe": default_universe() })).unwrap();
    assert_eq!(erc.exclude_ids, cfg.erc_exclude_ids);
    assert_eq!(erc.solver, RiskParitySolver::from_config(&cfg));

    let fr: FrontierInput =
        serde_json::from_value(serde_json::json!({ "universe": default_universe() })).unwrap();
    assert_eq!(fr.sample_count, cfg.frontier_samples);
    assert_eq!(fr.bin_width, cfg.frontier_bin_width);
    assert_eq!(fr.blend_steps, cfg.blend_steps);
    assert_eq!(fr.risk_free_rate, cfg.risk_free_rate);
}

// ---------------------------------------------------------------------------
// Frontier
// ---------------------------------------------------------------------------

#[test]
fn test_every_frontier_point_is_feasible() {
    let u = default_universe();
    let c = ConstraintSet::new()
        .with(0, Constraint::Min { min: 2.0 })
        .with(4, Constraint::Max { max: 10.0 })
        .with(5, Constraint::Range { min: 5.0, max: 20.0 })
        .with_liquidity_cap(25.0);
    let res = frontier(&u, 3_000, &c, &seeded(17)).unwrap();
    assert!(!res.pareto_frontier.is_empty());
    for p in res.population.iter().chain(&res.pareto_frontier) {
        assert!(c.is_feasible(&p.weights, &u), "infeasible point {:?}", p.weights);
    }
}

#[test]
fn test_fixed_constraints_over_100_give_empty_population() {
    let u = default_universe();
    let c = ConstraintSet::new()
        .with(1, Constraint::Fixed { value: 70.0 })
        .with(2, Constraint::Fixed { value: 40.0 });
    let res = frontier(&u, 500, &c, &seeded(4)).unwrap();
    assert!(res.population.is_empty());
    assert!(res.pareto_frontier.is_empty());
}

#[test]
fn test_illiquid_floor_above_liquidity_cap_gives_empty_population() {
    let u = default_universe();
    assert!(!u.assets()[5].liquid);
    let c = ConstraintSet::new()
        .with(5, Constraint::Min { min: 40.0 })
        .with_liquidity_cap(20.0);
    let res = frontier(&u, 2_000, &c, &seeded(12)).unwrap();
    assert!(res.population.is_empty());
    assert!(res.pareto_frontier.is_empty());

    let input = FrontierInput {
        universe: u,
        constraints: c,
        sample_count: 2_000,
        seed: Some(12),
        bin_width: 0.5,
        blend_steps: 11,
        risk_free_rate: 4.0,
        include_population: false,
    };
    let out = search_frontier(&input).unwrap();
    assert_eq!(out.result.population_size, 0);
    assert!(out.warnings.iter().any(|w| w.contains("No feasible portfolio")));
}

#[test]
fn test_fixed_constraints_summing_to_100_give_single_point() {
    let u = default_universe();
    let mut c = ConstraintSet::new();
    for (i, v) in [5.0, 35.0, 40.0, 5.0, 5.0, 5.0, 5.0].into_iter().enumerate() {
        c = c.with(i, Constraint::Fixed { value: v });
    }
    let res = frontier(&u, 200, &c, &seeded(8)).unwrap();
    assert_eq!(res.pareto_frontier.len(), 1);
    assert_relative_eq!(res.pareto_frontier[0].weights[2], 40.0, epsilon = 1e-9);
}

#[test]
fn test_bucketed_curve_is_sorted_and_thinner() {
    let u = default_universe();
    let res = frontier(&u, 5_000, &ConstraintSet::new(), &seeded(23)).unwrap();
    let curve = bucket_frontier(&res.population, 0.5).unwrap();
    assert!(curve.len() <= res.population.len());
    for pair in curve.windows(2) {
        assert!(pair[0].volatility <= pair[1].volatility);
        assert!(((pair[0].volatility / 0.5).round() as i64) < ((pair[1].volatility / 0.5).round() as i64));
    }
}

#[test]
fn test_cancellation_from_another_thread() {
    let token = CancellationToken::new();
    let remote = token.clone();
    std::thread::spawn(move || remote.cancel()).join().unwrap();
    let opts = FrontierOptions {
        cancel: Some(token),
        check_every: 1,
        ..seeded(5)
    };
    let res = frontier(&default_universe(), 1_000_000, &ConstraintSet::new(), &opts).unwrap();
    assert!(res.cancelled);
    assert_eq!(res.drawn, 0);
}

#[test]
fn test_search_frontier_reports_empty_population() {
    let input: FrontierInput = serde_json::from_value(serde_json::json!({
        "universe": default_universe(),
        "constraints": {
            "per_asset": {
                "0": { "type": "fixed", "value": 80.0 },
                "1": { "type": "min", "min": 40.0 }
            }
        },
        "sample_count": 100,
        "seed": 1,
    }))
    .unwrap();
    let out = search_frontier(&input).unwrap();
    assert_eq!(out.result.population_size, 0);
    assert!(out.result.max_sharpe.is_none());
    assert!(out.warnings.iter().any(|w| w.contains("No feasible portfolio")));
}

// ---------------------------------------------------------------------------
// Shortcuts
// ---------------------------------------------------------------------------

#[test]
fn test_shortcut_erc_respects_fixed_weight() {
    let input = ShortcutInput {
        universe: default_universe(),
        constraints: ConstraintSet::new().with(0, Constraint::Fixed { value: 10.0 }),
        method: ShortcutMethod::Erc,
        solver: RiskParitySolver::default(),
    };
    let out = apply_shortcut(&input).unwrap();
    assert_eq!(out.result.allocation.weights[0], 10.0);
    assert_relative_eq!(out.result.allocation.total, 100.0, epsilon = 1e-9);
    assert!(out.result.violations.is_empty());
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);
}
