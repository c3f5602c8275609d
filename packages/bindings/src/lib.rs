//! Node bindings: every entry point takes and returns a JSON string.

use std::thread;
use std::time::Duration;

use napi::Result as NapiResult;
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use portfolio_optimizer_core::analytics::{self, PortfolioAnalysisInput};
use portfolio_optimizer_core::consolidation::{self, ConsolidationInput};
use portfolio_optimizer_core::optimization::{
    self, CancellationToken, ErcInput, FrontierInput, ShortcutInput,
};
use portfolio_optimizer_core::universe::{
    AssetUniverse, DefaultPayload, LeverageProfile, WeightVector,
};
use portfolio_optimizer_core::EngineResult;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn call<I, O>(input_json: &str, f: impl FnOnce(&I) -> EngineResult<O>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(to_napi_error)?;
    let output = f(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_portfolio(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &PortfolioAnalysisInput| {
        analytics::analyze_portfolio(i)
    })
}

#[derive(Deserialize)]
struct RiskBudgetInput {
    universe: AssetUniverse,
    weights: WeightVector,
    #[serde(default)]
    leverage: Option<LeverageProfile>,
}

#[napi]
pub fn risk_budget(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &RiskBudgetInput| {
        i.universe.check_len("weights", i.weights.len())?;
        analytics::risk_budget(&i.weights.normalized(), &i.universe, i.leverage.as_ref())
    })
}

#[napi]
pub fn default_payload() -> NapiResult<String> {
    serde_json::to_string(&DefaultPayload::builtin()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

#[napi]
pub fn solve_erc(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &ErcInput| optimization::solve_erc(i))
}

#[napi]
pub fn apply_shortcut(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &ShortcutInput| optimization::apply_shortcut(i))
}

/// Frontier search; a non-zero `timeout_ms` stops sampling early and returns
/// what was found so far.
#[napi]
pub fn search_frontier(input_json: String, timeout_ms: Option<u32>) -> NapiResult<String> {
    let token = timeout_ms.filter(|ms| *ms > 0).map(|ms| {
        let token = CancellationToken::new();
        let remote = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(u64::from(ms)));
            remote.cancel();
        });
        token
    });
    call(&input_json, |i: &FrontierInput| {
        optimization::search_frontier_with_cancel(i, token)
    })
}

// ---------------------------------------------------------------------------
// Consolidation
// ---------------------------------------------------------------------------

#[napi]
pub fn consolidate_family(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &ConsolidationInput| {
        consolidation::consolidate_family(i)
    })
}
