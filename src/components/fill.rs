use crate::pattern::{PatternStore, is_fill_blocking};

/// Regions larger than this need the user's go-ahead before they are stitched.
pub const DEFAULT_FILL_CONFIRM_THRESHOLD: usize = 100;

/// A computed fill waiting for confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingFill {
    pub seed: (u32, u32),
    pub target_code: String,
    pub cells: Vec<(u32, u32)>,
}

impl PendingFill {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn needs_confirmation(&self, threshold: usize) -> bool {
        self.cells.len() > threshold
    }
}

/// 4-connected region of `target` around `start` in the merged view.
pub fn flood_fill(store: &PatternStore, start: (u32, u32), target: &str) -> Vec<(u32, u32)> {
    let grid = store.merged_grid();
    fill_region(&grid, store.cols(), store.rows(), start, target)
}

/// Flood fill over a pre-extracted row-major grid.
///
/// DFS with a Vec stack and a visited mask, so each cell is examined at most
/// once.  Stitched and empty targets never fill.
pub fn fill_region(
    grid: &[Option<&str>],
    cols: u32,
    rows: u32,
    start: (u32, u32),
    target: &str,
) -> Vec<(u32, u32)> {
    let (start_x, start_y) = start;
    if is_fill_blocking(target) || start_x >= cols || start_y >= rows {
        return Vec::new();
    }

    let wu = cols as usize;
    let matches = |idx: usize| grid.get(idx).copied().flatten() == Some(target);

    let seed_idx = start_y as usize * wu + start_x as usize;
    if !matches(seed_idx) {
        return Vec::new();
    }

    let mut visited = vec![false; wu * rows as usize];
    let mut stack: Vec<usize> = Vec::with_capacity(256);
    let mut region = Vec::new();
    visited[seed_idx] = true;
    stack.push(seed_idx);

    while let Some(idx) = stack.pop() {
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        region.push((x, y));

        // North, South, West, East
        let mut neighbours = [None; 4];
        if y > 0 {
            neighbours[0] = Some(idx - wu);
        }
        if y + 1 < rows {
            neighbours[1] = Some(idx + wu);
        }
        if x > 0 {
            neighbours[2] = Some(idx - 1);
        }
        if x + 1 < cols {
            neighbours[3] = Some(idx + 1);
        }
        for ni in neighbours.into_iter().flatten() {
            if !visited[ni] && matches(ni) {
                visited[ni] = true;
                stack.push(ni);
            }
        }
    }

    region
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::tests::two_color_palette;
    use crate::pattern::{Pattern, STITCHED_CODE};

    fn grid_of(rows: &[&str]) -> (Vec<Option<String>>, u32, u32) {
        let cols = rows[0].len() as u32;
        let cells = rows
            .iter()
            .flat_map(|r| {
                r.chars().map(|c| match c {
                    '.' => None,
                    'S' => Some(STITCHED_CODE.to_string()),
                    other => Some(other.to_string()),
                })
            })
            .collect();
        (cells, cols, rows.len() as u32)
    }

    fn fill(rows: &[&str], start: (u32, u32), target: &str) -> Vec<(u32, u32)> {
        let (cells, cols, h) = grid_of(rows);
        let grid: Vec<Option<&str>> = cells.iter().map(|c| c.as_deref()).collect();
        let mut out = fill_region(&grid, cols, h, start, target);
        out.sort();
        out
    }

    #[test]
    fn stitched_center_does_not_split_ring() {
        let region = fill(&["AAA", "ASA", "AAA"], (0, 0), "A");
        assert_eq!(region.len(), 8);
        assert!(!region.contains(&(1, 1)));
    }

    #[test]
    fn diagonal_cells_are_not_connected() {
        let region = fill(&["AB", "BA"], (0, 0), "A");
        assert_eq!(region, vec![(0, 0)]);
    }

    #[test]
    fn stitched_wall_blocks_propagation() {
        let region = fill(&["AASAA", "AASAA"], (0, 0), "A");
        assert_eq!(region, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn absent_cells_block_propagation() {
        let region = fill(&["A.A"], (0, 0), "A");
        assert_eq!(region, vec![(0, 0)]);
    }

    #[test]
    fn blocking_targets_fill_nothing() {
        assert!(fill(&["SS"], (0, 0), STITCHED_CODE).is_empty());
        assert!(fill(&["00"], (0, 0), "0").is_empty());
    }

    #[test]
    fn seed_outside_grid_fills_nothing() {
        assert!(fill(&["AA"], (5, 0), "A").is_empty());
    }

    #[test]
    fn seed_of_other_color_fills_nothing() {
        assert!(fill(&["AB"], (1, 0), "A").is_empty());
    }

    #[test]
    fn flood_fill_sees_the_change_overlay() {
        let mut store = PatternStore::new(Pattern::filled(3, 1, two_color_palette(), "310"));
        store.stitch_cells(&[(1, 0)]);
        assert_eq!(flood_fill(&store, (0, 0), "310"), vec![(0, 0)]);
    }

    #[test]
    fn confirmation_gate_is_strictly_greater() {
        let pending = PendingFill {
            seed: (0, 0),
            target_code: "A".into(),
            cells: vec![(0, 0); 100],
        };
        assert!(!pending.needs_confirmation(DEFAULT_FILL_CONFIRM_THRESHOLD));
        let bigger = PendingFill {
            cells: vec![(0, 0); 101],
            ..pending
        };
        assert!(bigger.needs_confirmation(DEFAULT_FILL_CONFIRM_THRESHOLD));
    }
}
