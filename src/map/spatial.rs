use std::collections::HashMap;

use crate::map::extent::Extent;

/// Spatial index over feature extents using conservative approximation.
/// Each feature's bounding box is indexed into every cell it overlaps,
/// guaranteeing no false negatives while allowing false positives
/// (eliminated by the exact extent test in the frame planner).
#[derive(Clone, Debug)]
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    cell_size: f64,
    /// Occupied cell range, used to clamp oversized queries
    min_cell: (i32, i32),
    max_cell: (i32, i32),
}

impl FeatureGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size,
            min_cell: (i32::MAX, i32::MAX),
            max_cell: (i32::MIN, i32::MIN),
        }
    }

    #[inline(always)]
    fn to_cell(&self, x: f64, y: f64) -> (i32, i32) {
        // `as` saturates, so far-away coordinates land on the border cells
        let cx = (x / self.cell_size).floor() as i32;
        let cy = (y / self.cell_size).floor() as i32;
        (cx, cy)
    }

    /// Build from feature extents, one entry per index in iteration order
    pub fn build<'a>(extents: impl IntoIterator<Item = &'a Extent>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (idx, ext) in extents.into_iter().enumerate() {
            if !ext.is_finite() {
                continue;
            }
            let lo = grid.to_cell(ext.min_x, ext.min_y);
            let hi = grid.to_cell(ext.max_x, ext.max_y);
            grid.min_cell = (grid.min_cell.0.min(lo.0), grid.min_cell.1.min(lo.1));
            grid.max_cell = (grid.max_cell.0.max(hi.0), grid.max_cell.1.max(hi.1));
            for y in lo.1..=hi.1 {
                for x in lo.0..=hi.0 {
                    grid.cells.entry((x, y)).or_default().push(idx);
                }
            }
        }
        grid
    }

    /// Build with a cell size chosen so the union of `extents` spans about
    /// `cells_per_axis` cells along its longer side
    pub fn build_auto(extents: &[Extent], cells_per_axis: usize) -> Self {
        let span = extents
            .iter()
            .filter(|e| e.is_finite())
            .fold(None, |acc: Option<Extent>, e| {
                Some(acc.map_or(*e, |a| a.union(e)))
            })
            .map_or(0.0, |u| u.width().max(u.height()));
        let cell_size = if span > 0.0 {
            span / cells_per_axis.max(1) as f64
        } else {
            1.0
        };
        Self::build(extents, cell_size)
    }

    /// Append feature indices whose cells overlap `query`.
    /// May contain duplicates; caller should dedup after all queries.
    pub fn query_into(&self, query: &Extent, results: &mut Vec<usize>) {
        if self.cells.is_empty() || !query.is_finite() {
            return;
        }
        let lo = self.to_cell(query.min_x, query.min_y);
        let hi = self.to_cell(query.max_x, query.max_y);
        let (x0, y0) = (lo.0.max(self.min_cell.0), lo.1.max(self.min_cell.1));
        let (x1, y1) = (hi.0.min(self.max_cell.0), hi.1.min(self.max_cell.1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                if let Some(indices) = self.cells.get(&(x, y)) {
                    results.extend_from_slice(indices);
                }
            }
        }
    }

    /// Sorted, deduplicated candidates for `query`
    pub fn query(&self, query: &Extent) -> Vec<usize> {
        let mut out = Vec::new();
        self.query_into(query, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }
}
