pub mod analysis;
pub mod risk_budget;
pub mod statistics;

pub use analysis::{analyze_portfolio, AssetVar, PortfolioAnalysisInput, PortfolioAnalysisOutput};
pub use risk_budget::{risk_budget, RiskContribution};
pub use statistics::{
    capital_allocation_line, diversification_ratio, effective_num_assets, parametric_var,
    portfolio_stats, portfolio_stats_leveraged, sharpe_ratio, standalone_var5,
    CapitalAllocationLine, PortfolioStats,
};
