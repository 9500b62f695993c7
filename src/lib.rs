//! Guillotine cutting-stock optimizer.
//!
//! Lays rectangular pieces out on rectangular stock panels using only
//! edge-to-edge cuts, searching over piece orderings and stock combinations
//! on a fixed worker pool.

pub mod config;
pub mod error;
pub mod guillotine;
pub mod permutation;
pub mod pool;
pub mod render;
pub mod scheduler;
pub mod solution;
pub mod solver;
pub mod stock;
pub mod tasks;
pub mod types;

pub use config::{CalculationRequest, Configuration, EngineConfig, Priority};
pub use error::RequestError;
pub use solution::{Solution, SolutionReport};
pub use solver::{CutListOptimizer, TaskHandle};
pub use types::{PanelSpec, TileDimensions};
