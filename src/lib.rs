//! # sharpe-rs
//!
//! $$
//! \max_{\mathbf w}\ \frac{\boldsymbol\mu^\top\mathbf w-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! $$
//!
//! Constrained Sharpe-ratio portfolio optimisation over historical close prices.
//!
//! - [`series`]: aligned price tables and log returns.
//! - [`stats`]: annualised mean/covariance and per-asset statistics.
//! - [`portfolio`]: constraints, the Sharpe objective and the optimiser.

pub mod error;
pub mod portfolio;
pub mod series;
pub mod stats;

pub use error::OptimiserError;
pub use error::Result;
pub use portfolio::Allocation;
pub use portfolio::OptimiserConfig;
pub use portfolio::Performance;
pub use portfolio::PortfolioOptimiser;
pub use series::PriceSeries;
pub use series::ReturnSeries;
pub use stats::AnnualizedStatistics;
