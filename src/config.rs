use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::types::PanelSpec;

/// Ranking axis applied after the "fewest unplaced pieces" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    MostTiles,
    LeastWastedArea,
    LeastNbrCuts,
    LeastNbrMosaics,
    BiggestUnusedTileArea,
    LeastNbrUnusedTiles,
}

impl Priority {
    pub fn defaults() -> Vec<Priority> {
        vec![
            Priority::MostTiles,
            Priority::LeastWastedArea,
            Priority::LeastNbrCuts,
        ]
    }
}

/// Per-request options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Material removed by each cut.
    #[serde(deserialize_with = "crate::types::deserialize_u32_from_number")]
    pub cut_thickness: u32,
    pub allow_tile_rotation: bool,
    /// Explicit beam width; 0 derives it from the stock utilisation.
    pub accuracy_factor: usize,
    pub priorities: Vec<Priority>,
    /// Only ever try a single stock panel.
    pub force_one_base_tile: bool,
    /// Stop at the first stock combination that fits every piece instead of
    /// also exploring combinations with more panels.
    pub use_minimum_panels: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            cut_thickness: 0,
            allow_tile_rotation: true,
            accuracy_factor: 0,
            priorities: Priority::defaults(),
            force_one_base_tile: false,
            use_minimum_panels: true,
        }
    }
}

/// Derives the beam width from how tightly the pieces fill the stock:
/// `max(floor, scale * ratio^3)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyPolicy {
    pub scale: f64,
    pub floor: usize,
}

impl AccuracyPolicy {
    pub const STANDARD: AccuracyPolicy = AccuracyPolicy {
        scale: 100.0,
        floor: 80,
    };

    pub const THOROUGH: AccuracyPolicy = AccuracyPolicy {
        scale: 500.0,
        floor: 100,
    };

    pub fn beam_width(&self, required_area: u64, stock_area: u64, accuracy_factor: usize) -> usize {
        if accuracy_factor > 0 {
            return accuracy_factor;
        }
        if stock_area == 0 {
            return self.floor.max(1);
        }
        let ratio = required_area as f64 / stock_area as f64;
        let derived = (self.scale * ratio.powi(3)) as usize;
        derived.max(self.floor).max(1)
    }
}

impl Default for AccuracyPolicy {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Process-wide engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub worker_threads: usize,
    pub queue_capacity: usize,
    pub max_permutations: usize,
    pub max_stock_panels: usize,
    pub accuracy: AccuracyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 8,
            queue_capacity: 1000,
            max_permutations: 50,
            max_stock_panels: 50,
            accuracy: AccuracyPolicy::STANDARD,
        }
    }
}

/// A full computation request as received from a transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculationRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(alias = "tiles")]
    pub pieces: Vec<PanelSpec>,
    #[serde(alias = "base_tiles")]
    pub stock: Vec<PanelSpec>,
    #[serde(default)]
    pub configuration: Configuration,
}

impl CalculationRequest {
    pub fn new(pieces: Vec<PanelSpec>, stock: Vec<PanelSpec>, configuration: Configuration) -> Self {
        Self {
            task_id: None,
            pieces,
            stock,
            configuration,
        }
    }

    /// Rejects requests that cannot start a task.
    pub fn validate(&self) -> Result<(), RequestError> {
        let usable = |specs: &[PanelSpec]| {
            specs
                .iter()
                .any(|s| s.enabled && s.width > 0 && s.height > 0 && s.quantity > 0)
        };
        if !usable(&self.pieces) {
            return Err(RequestError::NoTiles);
        }
        if !usable(&self.stock) {
            return Err(RequestError::NoStockTiles);
        }
        Ok(())
    }
}
