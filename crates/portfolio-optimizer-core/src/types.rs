use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Monetary values (entity sizes, family totals). Wraps Decimal to keep
/// currency arithmetic exact.
pub type Money = Decimal;

/// Percent-per-year quantities as entered by users (9.5 = 9.5%).
pub type Percent = f64;

/// Weight expressed as a fraction of the portfolio (0.25 = 25%).
pub type Fraction = f64;

/// Standard normal 5th-percentile z-score used by the one-tailed 95% VaR.
pub const Z_SCORE_95: f64 = 1.645;

/// Guard added to risk denominators so zero-risk portfolios degrade to zero
/// contributions rather than NaN.
pub const RISK_EPSILON: f64 = 1e-12;

/// Tolerance used when checking weights against percent bounds.
pub const BOUND_TOLERANCE: f64 = 1e-6;

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}
