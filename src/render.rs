use crate::guillotine::Mosaic;
use crate::solution::{PanelReport, PlacedTile};

const MAX_WIDTH: f64 = 80.0;
const MAX_HEIGHT: f64 = 40.0;

/// ASCII drawing of one panel with its placed pieces, scaled to fit a
/// terminal.
pub fn render_panel(panel: &PanelReport) -> String {
    render_tiles(panel.width, panel.height, &panel.tiles)
}

pub fn render_mosaic(mosaic: &Mosaic) -> String {
    render_panel(&PanelReport::from(mosaic))
}

pub fn render_tiles(width: u32, height: u32, tiles: &[PlacedTile]) -> String {
    if width == 0 || height == 0 {
        return String::new();
    }
    let scale = f64::min(MAX_WIDTH / width as f64, MAX_HEIGHT / height as f64);
    let grid_w = (width as f64 * scale).round() as usize;
    let grid_h = (height as f64 * scale).round() as usize;

    if grid_w == 0 || grid_h == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; grid_h + 1];

    draw_rect(&mut grid, 0, 0, grid_w, grid_h);

    for tile in tiles {
        let sx = (tile.x as f64 * scale).round() as usize;
        let sy = (tile.y as f64 * scale).round() as usize;
        let sw = (tile.width as f64 * scale).round() as usize;
        let sh = (tile.height as f64 * scale).round() as usize;

        if sw == 0 || sh == 0 {
            continue;
        }

        draw_rect(&mut grid, sx, sy, sw, sh);

        let label: Vec<char> = format!("{}x{}", tile.width, tile.height).chars().collect();
        if sw > 2 {
            let cy = sy + sh / 2;
            let start_x = (sx + sw / 2).saturating_sub(label.len() / 2);

            for (i, &ch) in label.iter().enumerate() {
                let x = start_x + i;
                if x > sx && x < sx + sw && cy > sy && cy < sy + sh {
                    grid[cy][x] = ch;
                }
            }
        }
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

fn edge(current: char, line: char, crossing: char) -> char {
    if current == crossing || current == '+' {
        '+'
    } else {
        line
    }
}

fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let Some(cols) = grid.first().map(Vec::len) else {
        return;
    };

    for i in (x..=x + w).filter(|&i| i < cols) {
        for j in [y, y + h].into_iter().filter(|&j| j < rows) {
            grid[j][i] = edge(grid[j][i], '-', '|');
        }
    }

    for j in (y..=y + h).filter(|&j| j < rows) {
        for i in [x, x + w].into_iter().filter(|&i| i < cols) {
            grid[j][i] = edge(grid[j][i], '|', '-');
        }
    }

    for cx in [x, x + w] {
        for cy in [y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guillotine::place;
    use crate::types::TileDimensions;

    fn tile(x: u32, y: u32, width: u32, height: u32) -> PlacedTile {
        PlacedTile {
            id: 1,
            x,
            y,
            width,
            height,
            rotated: false,
        }
    }

    #[test]
    fn test_render_single_piece() {
        let output = render_tiles(100, 50, &[tile(0, 0, 100, 50)]);
        assert!(output.contains('+'));
        assert!(output.contains('-'));
        assert!(output.contains('|'));
        assert!(output.contains("100x50"));
    }

    #[test]
    fn test_render_two_pieces() {
        let output = render_tiles(100, 100, &[tile(0, 0, 50, 100), tile(50, 0, 50, 100)]);
        assert!(output.contains("50x100"));
    }

    #[test]
    fn test_render_empty_panel_draws_border() {
        let output = render_tiles(100, 100, &[]);
        assert!(output.contains('+'));
        assert!(render_tiles(0, 100, &[]).is_empty());
    }

    #[test]
    fn test_render_mosaic_labels_pieces() {
        let mosaic = Mosaic::new(TileDimensions::new(0, 200, 100));
        let placed = place(&TileDimensions::new(3, 80, 100), &mosaic, 0, false);
        let output = render_mosaic(&placed[0]);
        assert!(output.contains("80x100"));
        assert!(!render_mosaic(&mosaic).contains('x'));
    }

    #[test]
    fn test_render_panel_report() {
        let panel = PanelReport {
            stock_id: 1,
            width: 200,
            height: 100,
            tiles: vec![tile(0, 0, 120, 100)],
            cuts: Vec::new(),
            used_area: 12_000,
            wasted_area: 8_000,
        };
        assert!(render_panel(&panel).contains("120x100"));
    }
}
