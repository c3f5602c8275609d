pub mod frontier;
pub mod risk_parity;
pub mod shortcuts;

pub use frontier::{
    bucket_frontier, frontier, nearest_point, pareto_frontier, search_frontier,
    search_frontier_with_cancel, CancellationToken, ChartScale, FrontierInput, FrontierOptions,
    FrontierOutput, FrontierPoint, FrontierResult, DEFAULT_PICK_DISTANCE,
};
pub use risk_parity::{erc_weights, solve_erc, ErcInput, ErcOutput, ErcSolution, RiskParitySolver};
pub use shortcuts::{
    apply_shortcut, equal_weight_with_constraints, erc_with_constraints, ShortcutInput,
    ShortcutMethod, ShortcutOutput, ShortcutWeights,
};
