//! # Portfolio
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\boldsymbol\mu^\top\mathbf{w}-r_f}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! \quad\text{s.t.}\quad \mathbf 1^\top\mathbf w = 1,\ \ \sum_{i\in g}w_i\le L_g,\ \ l_i\le w_i\le u_i
//! $$
//!
//! Long-only Sharpe-ratio maximisation under a full-investment budget,
//! asset-class exposure caps and per-asset bounds.

pub mod config;
pub mod constraints;
pub mod objective;
pub mod optimiser;
mod solver;
pub mod types;
pub mod universe;

pub use config::AssetClassLimits;
pub use config::AssetClassMembership;
pub use config::OptimiserConfig;
pub use config::SolverSettings;
pub use constraints::ConstraintSet;
pub use constraints::GroupCap;
pub use objective::SharpeObjective;
pub use optimiser::PortfolioOptimiser;
pub use types::Allocation;
pub use types::Performance;
pub use universe::membership_from_tickers;
