//! Selection of the stock panels a search attempt is allowed to use.

use crate::types::{StockSolution, TileDimensions};

/// What a stock combination has to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickCriteria {
    pub required_area: u64,
    pub required_max_dimension: u32,
    pub min_panels: usize,
    pub max_panels: usize,
    /// Extra panels on top of the smallest feasible count.
    pub spare: usize,
}

impl PickCriteria {
    /// Area and largest dimension needed to hold `tiles`, with the area
    /// scaled by `1 + area_delta`.
    pub fn for_tiles(tiles: &[TileDimensions], area_delta: f64) -> Self {
        let area: u64 = tiles.iter().map(TileDimensions::area).sum();
        let required_max_dimension = tiles.iter().map(TileDimensions::max_dimension).max().unwrap_or(0);
        Self {
            required_area: (area as f64 * (1.0 + area_delta)) as u64,
            required_max_dimension,
            min_panels: 1,
            max_panels: usize::MAX,
            spare: 0,
        }
    }

    pub fn panels(mut self, min_panels: usize, max_panels: usize) -> Self {
        self.min_panels = min_panels;
        self.max_panels = max_panels;
        self
    }

    pub fn with_spare(mut self, spare: usize) -> Self {
        self.spare = spare;
        self
    }
}

/// Backtracking search over combinations of the available stock panels.
#[derive(Debug, Clone)]
pub struct StockPanelPicker {
    /// Ascending by area; identical panels are adjacent.
    stock: Vec<TileDimensions>,
}

impl StockPanelPicker {
    pub fn new(mut stock: Vec<TileDimensions>) -> Self {
        stock.sort_by_key(|t| (t.area(), t.width, t.height));
        Self { stock }
    }

    pub fn stock(&self) -> &[TileDimensions] {
        &self.stock
    }

    pub fn total_area(&self) -> u64 {
        self.stock.iter().map(TileDimensions::area).sum()
    }

    /// Returns the first non-excluded combination with the fewest panels
    /// that meets `criteria`, or the largest panels as a last resort.
    pub fn pick(&self, criteria: &PickCriteria, exclusions: &[StockSolution]) -> Option<StockSolution> {
        if criteria.required_area == 0 || self.stock.is_empty() {
            return None;
        }

        let upper = criteria.max_panels.min(self.stock.len());
        let lower = criteria.min_panels.max(1);

        for k in lower..=upper {
            let Some(found) = self.search(k, criteria, exclusions) else {
                continue;
            };
            if criteria.spare > 0 && k + criteria.spare <= upper {
                if let Some(with_spare) = self.search(k + criteria.spare, criteria, exclusions) {
                    return Some(with_spare);
                }
            }
            return Some(found);
        }

        let fallback = self.largest(criteria.max_panels);
        if fallback.area() >= criteria.required_area && !is_excluded(&fallback, exclusions) {
            tracing::debug!(stock = %fallback, "falling back to the largest stock panels");
            return Some(fallback);
        }
        None
    }

    /// The `count` largest panels, largest first.
    pub fn largest(&self, count: usize) -> StockSolution {
        StockSolution::new(self.stock.iter().rev().take(count).copied().collect())
    }

    fn search(&self, k: usize, criteria: &PickCriteria, exclusions: &[StockSolution]) -> Option<StockSolution> {
        let mut chosen = Vec::with_capacity(k);
        self.backtrack(k, 0, 0, &mut chosen, criteria, exclusions)
    }

    fn backtrack(
        &self,
        k: usize,
        start: usize,
        area: u64,
        chosen: &mut Vec<usize>,
        criteria: &PickCriteria,
        exclusions: &[StockSolution],
    ) -> Option<StockSolution> {
        if chosen.len() == k {
            return self.accept(chosen, area, criteria, exclusions);
        }

        let remaining = k - chosen.len();
        let n = self.stock.len();
        if n - start < remaining {
            return None;
        }
        // The largest panels sit at the end of the list.
        let best_case: u64 = self.stock[n - remaining..].iter().map(TileDimensions::area).sum();
        if area + best_case < criteria.required_area {
            return None;
        }

        for i in start..=n - remaining {
            if i > start && self.stock[i].dimensions() == self.stock[i - 1].dimensions() {
                continue;
            }
            chosen.push(i);
            let found = self.backtrack(k, i + 1, area + self.stock[i].area(), chosen, criteria, exclusions);
            chosen.pop();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn accept(
        &self,
        chosen: &[usize],
        area: u64,
        criteria: &PickCriteria,
        exclusions: &[StockSolution],
    ) -> Option<StockSolution> {
        if area < criteria.required_area {
            return None;
        }
        let long_enough = chosen
            .iter()
            .any(|&i| self.stock[i].max_dimension() >= criteria.required_max_dimension);
        if !long_enough {
            return None;
        }
        let candidate = StockSolution::new(chosen.iter().map(|&i| self.stock[i]).collect());
        if is_excluded(&candidate, exclusions) {
            return None;
        }
        Some(candidate)
    }
}

fn is_excluded(candidate: &StockSolution, exclusions: &[StockSolution]) -> bool {
    exclusions.iter().any(|e| e == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panels(spec: &[(u32, u32, usize)]) -> Vec<TileDimensions> {
        let mut out = Vec::new();
        for (id, &(w, h, qty)) in spec.iter().enumerate() {
            for _ in 0..qty {
                out.push(TileDimensions::new(id as u32 + 100, w, h));
            }
        }
        out
    }

    fn criteria(area: u64, max_dim: u32, max_panels: usize) -> PickCriteria {
        PickCriteria {
            required_area: area,
            required_max_dimension: max_dim,
            min_panels: 1,
            max_panels,
            spare: 0,
        }
    }

    #[test]
    fn test_picks_smallest_single_panel() {
        let picker = StockPanelPicker::new(panels(&[(300, 300, 1), (100, 100, 1), (200, 200, 1)]));
        let pick = picker.pick(&criteria(30_000, 150, 5), &[]).unwrap();
        assert_eq!(pick.len(), 1);
        assert_eq!(pick.tiles()[0].dimensions(), (200, 200));
    }

    #[test]
    fn test_combines_panels_when_one_is_not_enough() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 3)]));
        let pick = picker.pick(&criteria(25_000, 100, 5), &[]).unwrap();
        assert_eq!(pick.len(), 3);
    }

    #[test]
    fn test_exclusions_are_skipped() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 2), (200, 200, 1)]));
        let c = criteria(10_000, 100, 5);

        let first = picker.pick(&c, &[]).unwrap();
        assert_eq!(first.tiles()[0].dimensions(), (100, 100));

        let second = picker.pick(&c, &[first.clone()]).unwrap();
        assert_ne!(second, first);
        assert_eq!(second.tiles()[0].dimensions(), (200, 200));

        // Next is a two-panel combination; the two 100x100 panels count once.
        let third = picker.pick(&c, &[first.clone(), second.clone()]).unwrap();
        assert_eq!(third.len(), 2);
        let fourth = picker.pick(&c, &[first, second, third.clone()]).unwrap();
        assert_eq!(fourth.len(), 2);
        assert_ne!(fourth, third);
    }

    #[test]
    fn test_never_returns_excluded() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 2), (150, 100, 2), (200, 200, 1)]));
        let c = criteria(10_000, 100, 5);
        let mut exclusions = Vec::new();
        while let Some(pick) = picker.pick(&c, &exclusions) {
            assert!(!exclusions.contains(&pick));
            exclusions.push(pick);
            assert!(exclusions.len() < 100);
        }
        assert!(exclusions.len() > 3);
    }

    #[test]
    fn test_none_when_area_exceeds_all_stock() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 5)]));
        let pieces = vec![TileDimensions::new(1, 300, 300)];
        let c = PickCriteria::for_tiles(&pieces, 0.0).panels(1, 5);
        assert_eq!(c.required_area, 90_000);
        assert_eq!(c.required_max_dimension, 300);
        assert!(picker.pick(&c, &[]).is_none());
    }

    #[test]
    fn test_fallback_to_largest_when_dimension_missing() {
        let picker = StockPanelPicker::new(panels(&[(200, 200, 2), (250, 200, 1)]));
        let c = criteria(10_000, 400, 2);
        let pick = picker.pick(&c, &[]).unwrap();
        assert_eq!(pick.len(), 2);
        assert_eq!(pick.tiles()[0].dimensions(), (250, 200));
        assert!(picker.pick(&c, &[pick]).is_none());
    }

    #[test]
    fn test_spare_adds_panels() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 4)]));
        let pick = picker
            .pick(&criteria(10_000, 100, 4).with_spare(1), &[])
            .unwrap();
        assert_eq!(pick.len(), 2);
    }

    #[test]
    fn test_empty_requirements() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 1)]));
        assert!(picker.pick(&criteria(0, 10, 5), &[]).is_none());
        let empty = StockPanelPicker::new(vec![]);
        assert!(empty.pick(&criteria(10, 10, 5), &[]).is_none());
    }

    #[test]
    fn test_min_panels_is_respected() {
        let picker = StockPanelPicker::new(panels(&[(100, 100, 3)]));
        let pick = picker.pick(&criteria(100, 10, 5).panels(2, 5), &[]).unwrap();
        assert_eq!(pick.len(), 2);
    }
}
