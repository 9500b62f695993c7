use std::cmp::Ordering;
use std::time::Duration;

use serde::Serialize;

use crate::config::Priority;
use crate::guillotine::{Cut, Mosaic};
use crate::types::{StockSolution, TileDimensions};

/// A candidate layout: one mosaic per stock panel plus the pieces that
/// could not be placed.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    mosaics: Vec<Mosaic>,
    no_fit_tiles: Vec<TileDimensions>,
    elapsed: Option<Duration>,
}

impl Solution {
    /// Fresh layout with one untouched mosaic per stock panel.
    pub fn from_stock(stock: &StockSolution) -> Self {
        Self {
            mosaics: stock.tiles().iter().copied().map(Mosaic::new).collect(),
            no_fit_tiles: Vec::new(),
            elapsed: None,
        }
    }

    /// Layout with no stock at all; every piece is reported as unplaced.
    pub fn unplaced(tiles: &[TileDimensions]) -> Self {
        Self {
            mosaics: Vec::new(),
            no_fit_tiles: tiles.to_vec(),
            elapsed: None,
        }
    }

    /// Copy of `self` with the mosaic at `index` replaced.
    pub fn with_mosaic(&self, index: usize, mosaic: Mosaic) -> Self {
        let mut next = self.clone();
        next.mosaics[index] = mosaic;
        next
    }

    pub fn mosaics(&self) -> &[Mosaic] {
        &self.mosaics
    }

    pub fn no_fit_tiles(&self) -> &[TileDimensions] {
        &self.no_fit_tiles
    }

    pub fn push_no_fit(&mut self, tile: TileDimensions) {
        self.no_fit_tiles.push(tile);
    }

    pub fn is_complete(&self) -> bool {
        self.no_fit_tiles.is_empty()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = Some(elapsed);
    }

    fn used_mosaics(&self) -> impl Iterator<Item = &Mosaic> {
        self.mosaics.iter().filter(|m| m.is_used())
    }

    pub fn nbr_final_tiles(&self) -> usize {
        self.mosaics.iter().map(|m| m.stats().final_tiles).sum()
    }

    pub fn nbr_cuts(&self) -> usize {
        self.mosaics.iter().map(|m| m.cuts().len()).sum()
    }

    pub fn nbr_used_mosaics(&self) -> usize {
        self.used_mosaics().count()
    }

    pub fn used_area(&self) -> u64 {
        self.mosaics.iter().map(|m| m.stats().used_area).sum()
    }

    /// Uncovered area of the panels that received at least one piece.
    pub fn wasted_area(&self) -> u64 {
        self.used_mosaics().map(Mosaic::wasted_area).sum()
    }

    pub fn biggest_unused_tile_area(&self) -> u64 {
        self.used_mosaics()
            .map(|m| m.stats().biggest_unused_area)
            .max()
            .unwrap_or(0)
    }

    pub fn nbr_unused_tiles(&self) -> usize {
        self.used_mosaics().map(|m| m.stats().unused_tiles).sum()
    }

    pub fn max_depth(&self) -> usize {
        self.mosaics.iter().map(|m| m.stats().depth).max().unwrap_or(0)
    }

    /// Stock panel dimensions, for logs.
    pub fn bases_as_string(&self) -> String {
        let stock = StockSolution::new(self.mosaics.iter().map(|m| *m.stock()).collect());
        stock.to_string()
    }

    pub fn report(&self) -> SolutionReport {
        SolutionReport::from(self)
    }
}

fn compare_by(priority: Priority, a: &Solution, b: &Solution) -> Ordering {
    match priority {
        Priority::MostTiles => b.nbr_final_tiles().cmp(&a.nbr_final_tiles()),
        Priority::LeastWastedArea => a.wasted_area().cmp(&b.wasted_area()),
        Priority::LeastNbrCuts => a.nbr_cuts().cmp(&b.nbr_cuts()),
        Priority::LeastNbrMosaics => a.nbr_used_mosaics().cmp(&b.nbr_used_mosaics()),
        Priority::BiggestUnusedTileArea => b
            .biggest_unused_tile_area()
            .cmp(&a.biggest_unused_tile_area()),
        Priority::LeastNbrUnusedTiles => a.nbr_unused_tiles().cmp(&b.nbr_unused_tiles()),
    }
}

/// Comparator chain: fewer unplaced pieces first, then each priority in
/// turn until one breaks the tie.
pub fn compare(a: &Solution, b: &Solution, priorities: &[Priority]) -> Ordering {
    priorities.iter().fold(
        a.no_fit_tiles.len().cmp(&b.no_fit_tiles.len()),
        |ord, &p| ord.then_with(|| compare_by(p, a, b)),
    )
}

/// Sorts best first. Stable, so equal solutions keep their order.
pub fn rank(solutions: &mut [Solution], priorities: &[Priority]) {
    solutions.sort_by(|a, b| compare(a, b, priorities));
}

/// A piece as placed on a panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedTile {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelReport {
    pub stock_id: u32,
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<PlacedTile>,
    pub cuts: Vec<Cut>,
    pub used_area: u64,
    pub wasted_area: u64,
}

impl From<&Mosaic> for PanelReport {
    fn from(mosaic: &Mosaic) -> Self {
        let tiles = mosaic
            .root()
            .final_tiles()
            .into_iter()
            .map(|n| PlacedTile {
                id: n.external_id.unwrap_or_default(),
                x: n.x1,
                y: n.y1,
                width: n.width(),
                height: n.height(),
                rotated: n.rotated,
            })
            .collect();
        Self {
            stock_id: mosaic.stock().id,
            width: mosaic.stock().width,
            height: mosaic.stock().height,
            tiles,
            cuts: mosaic.cuts().to_vec(),
            used_area: mosaic.stats().used_area,
            wasted_area: mosaic.wasted_area(),
        }
    }
}

/// Serialisable view of a [`Solution`].
#[derive(Debug, Clone, Serialize)]
pub struct SolutionReport {
    pub panels: Vec<PanelReport>,
    pub no_fit_tiles: Vec<TileDimensions>,
    pub total_cuts: usize,
    pub used_area: u64,
    pub wasted_area: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl SolutionReport {
    pub fn placed_tiles(&self) -> usize {
        self.panels.iter().map(|p| p.tiles.len()).sum()
    }
}

impl From<&Solution> for SolutionReport {
    fn from(solution: &Solution) -> Self {
        Self {
            panels: solution.mosaics.iter().map(PanelReport::from).collect(),
            no_fit_tiles: solution.no_fit_tiles.clone(),
            total_cuts: solution.nbr_cuts(),
            used_area: solution.used_area(),
            wasted_area: solution.wasted_area(),
            elapsed_ms: solution.elapsed.map(|d| d.as_millis() as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guillotine::place;

    fn stock(spec: &[(u32, u32)]) -> StockSolution {
        StockSolution::new(
            spec.iter()
                .enumerate()
                .map(|(i, &(w, h))| TileDimensions::new(i as u32, w, h))
                .collect(),
        )
    }

    fn placed(solution: &Solution, piece: TileDimensions) -> Solution {
        let out = place(&piece, &solution.mosaics()[0], 0, false);
        solution.with_mosaic(0, out.into_iter().next().unwrap())
    }

    #[test]
    fn test_fresh_solution_metrics() {
        let s = Solution::from_stock(&stock(&[(100, 100), (50, 50)]));
        assert_eq!(s.mosaics().len(), 2);
        assert_eq!(s.nbr_final_tiles(), 0);
        assert_eq!(s.nbr_used_mosaics(), 0);
        assert_eq!(s.wasted_area(), 0);
        assert!(s.is_complete());
        assert_eq!(s.bases_as_string(), "[100x100 50x50]");
    }

    #[test]
    fn test_unplaced_always_ranks_last() {
        let base = Solution::from_stock(&stock(&[(100, 100)]));
        let good = placed(&base, TileDimensions::new(1, 50, 50));
        let mut bad = base.clone();
        bad.push_no_fit(TileDimensions::new(1, 500, 500));

        let mut pool = vec![bad.clone(), good.clone()];
        // Even with a chain that would prefer the untouched panel.
        rank(&mut pool, &[Priority::LeastNbrCuts, Priority::LeastWastedArea]);
        assert!(pool[0].is_complete());
        assert!(!pool[1].is_complete());
    }

    #[test]
    fn test_priorities_break_ties() {
        let base = Solution::from_stock(&stock(&[(100, 100)]));
        let exact = placed(&base, TileDimensions::new(1, 100, 100));
        let partial = placed(&base, TileDimensions::new(1, 100, 50));

        assert_eq!(
            compare(&exact, &partial, &[Priority::LeastNbrCuts]),
            Ordering::Less
        );
        assert_eq!(
            compare(&exact, &partial, &[Priority::BiggestUnusedTileArea]),
            Ordering::Greater
        );
        assert_eq!(compare(&exact, &partial, &[]), Ordering::Equal);
    }

    #[test]
    fn test_with_mosaic_leaves_original() {
        let base = Solution::from_stock(&stock(&[(100, 100)]));
        let next = placed(&base, TileDimensions::new(1, 40, 40));
        assert_eq!(base.nbr_final_tiles(), 0);
        assert_eq!(next.nbr_final_tiles(), 1);
        assert_eq!(next.wasted_area(), 10_000 - 1_600);
    }

    #[test]
    fn test_report_lists_placements_and_cuts() {
        let base = Solution::from_stock(&stock(&[(100, 100)]));
        let mut next = placed(&base, TileDimensions::new(9, 40, 40));
        next.set_elapsed(Duration::from_millis(12));
        let report = next.report();
        assert_eq!(report.panels.len(), 1);
        assert_eq!(report.placed_tiles(), 1);
        assert_eq!(
            report.panels[0].tiles[0],
            PlacedTile {
                id: 9,
                x: 0,
                y: 0,
                width: 40,
                height: 40,
                rotated: false
            }
        );
        assert_eq!(report.total_cuts, 2);
        assert_eq!(report.elapsed_ms, Some(12));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["panels"][0]["cuts"][0]["orientation"], "vertical");
    }
}
