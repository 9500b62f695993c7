//! Beam search over partial layouts.

use crate::config::Configuration;
use crate::guillotine::place;
use crate::solution::{Solution, rank};
use crate::types::TileDimensions;

/// Places `pieces` one at a time into every solution of the pool, keeping
/// only the best `beam_width` candidates after each step.
///
/// A solution where the current piece fits nowhere keeps its layout and
/// records the piece as unplaced.
pub fn compute_solutions(
    pieces: &[TileDimensions],
    solutions: &mut Vec<Solution>,
    cfg: &Configuration,
    beam_width: usize,
) {
    let beam_width = beam_width.max(1);

    for piece in pieces {
        let mut next = Vec::with_capacity(solutions.len() * 2);

        for mut solution in solutions.drain(..) {
            let expanded = expand(&solution, piece, cfg);
            if expanded.is_empty() {
                solution.push_no_fit(*piece);
                next.push(solution);
            } else {
                next.extend(expanded);
            }
        }

        rank(&mut next, &cfg.priorities);
        next.truncate(beam_width);
        *solutions = next;
    }
}

/// Every solution obtained by placing `piece` into one mosaic of
/// `solution`.
fn expand(solution: &Solution, piece: &TileDimensions, cfg: &Configuration) -> Vec<Solution> {
    let mut out = Vec::new();
    let mosaics = solution.mosaics();

    for (index, mosaic) in mosaics.iter().enumerate() {
        // Untouched panels of equal size give identical outcomes.
        let duplicate = !mosaic.is_used()
            && mosaics[..index]
                .iter()
                .any(|m| !m.is_used() && m.stock().dimensions() == mosaic.stock().dimensions());
        if duplicate {
            continue;
        }

        for placed in place(piece, mosaic, cfg.cut_thickness, cfg.allow_tile_rotation) {
            out.push(solution.with_mosaic(index, placed));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Priority;
    use crate::types::StockSolution;

    fn cfg(rotation: bool) -> Configuration {
        Configuration {
            allow_tile_rotation: rotation,
            ..Configuration::default()
        }
    }

    fn pieces(w: u32, h: u32, qty: u32) -> Vec<TileDimensions> {
        (0..qty).map(|i| TileDimensions::new(i, w, h)).collect()
    }

    fn start(spec: &[(u32, u32)]) -> Vec<Solution> {
        let stock = StockSolution::new(
            spec.iter()
                .enumerate()
                .map(|(i, &(w, h))| TileDimensions::new(i as u32, w, h))
                .collect(),
        );
        vec![Solution::from_stock(&stock)]
    }

    #[test]
    fn test_four_squares_fit_one_panel() {
        let mut solutions = start(&[(200, 200)]);
        compute_solutions(&pieces(100, 100, 4), &mut solutions, &cfg(false), 80);
        let best = &solutions[0];
        assert!(best.is_complete());
        assert_eq!(best.nbr_final_tiles(), 4);
        assert_eq!(best.wasted_area(), 0);
        // Two orthogonal splits plus one on the remaining half.
        assert_eq!(best.nbr_cuts(), 3);
    }

    #[test]
    fn test_unfit_piece_is_recorded() {
        let mut solutions = start(&[(100, 100)]);
        let mut input = pieces(50, 50, 1);
        input.push(TileDimensions::new(7, 300, 300));
        compute_solutions(&input, &mut solutions, &cfg(true), 10);

        assert!(!solutions.is_empty());
        for s in &solutions {
            assert_eq!(s.nbr_final_tiles(), 1);
            assert_eq!(s.no_fit_tiles().len(), 1);
            assert_eq!(s.no_fit_tiles()[0].id, 7);
        }
    }

    #[test]
    fn test_beam_width_bounds_pool() {
        let mut solutions = start(&[(1000, 1000)]);
        compute_solutions(&pieces(30, 70, 6), &mut solutions, &cfg(true), 5);
        assert!(solutions.len() <= 5);
        assert!(solutions.iter().all(|s| s.nbr_final_tiles() == 6));
    }

    #[test]
    fn test_pruning_keeps_complete_solutions_first() {
        // Only one 60x60 fits per panel; with two panels both fit.
        let mut solutions = start(&[(100, 100), (100, 100)]);
        compute_solutions(&pieces(60, 60, 3), &mut solutions, &cfg(false), 3);
        for s in &solutions {
            assert_eq!(s.nbr_final_tiles(), 2);
            assert_eq!(s.no_fit_tiles().len(), 1);
        }

        let mut solutions = start(&[(100, 100), (100, 100)]);
        compute_solutions(&pieces(60, 60, 2), &mut solutions, &cfg(false), 3);
        assert!(solutions[0].is_complete());
        let first_incomplete = solutions.iter().position(|s| !s.is_complete());
        if let Some(pos) = first_incomplete {
            assert!(solutions[pos..].iter().all(|s| !s.is_complete()));
        }
    }

    #[test]
    fn test_identical_empty_panels_are_tried_once() {
        let solutions = start(&[(100, 100), (100, 100)]);
        let expanded = expand(&solutions[0], &TileDimensions::new(1, 100, 100), &cfg(false));
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn test_mixed_panels_use_least_mosaics() {
        let mut solutions = start(&[(100, 100), (100, 100)]);
        let cfg = Configuration {
            allow_tile_rotation: false,
            priorities: vec![Priority::LeastNbrMosaics],
            ..Configuration::default()
        };
        compute_solutions(&pieces(50, 50, 4), &mut solutions, &cfg, 50);
        assert!(solutions[0].is_complete());
        assert_eq!(solutions[0].nbr_used_mosaics(), 1);
    }
}
