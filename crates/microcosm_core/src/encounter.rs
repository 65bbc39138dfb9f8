//! Uniform-grid proximity index for actor encounter detection.

use std::collections::HashMap;

/// Grid-based spatial index over actor positions, rebuilt each pass.
///
/// Cells are keyed on (x, y); actors are binned by floored cell
/// coordinate and queried through the cell plus its neighbors. Cell
/// size matches the base encounter radius so a one-cell neighborhood
/// covers it.
#[derive(Debug, Default)]
pub struct EncounterIndex {
    cell_size: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    positions: Vec<(f64, f64, f64)>,
}

impl EncounterIndex {
    /// Builds the index from actor positions. Indices into `positions`
    /// are the identities returned by queries.
    #[must_use]
    pub fn build(positions: &[(f64, f64, f64)], cell_size: f64) -> Self {
        debug_assert!(cell_size > 0.0);
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, &(x, y, _)) in positions.iter().enumerate() {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            cells.entry(cell_key(x, y, cell_size)).or_default().push(idx);
        }
        Self {
            cell_size,
            cells,
            positions: positions.to_vec(),
        }
    }

    /// Collects indices of actors within `radius` of a point into `out`.
    pub fn query_into(&self, x: f64, y: f64, z: f64, radius: f64, out: &mut Vec<usize>) {
        out.clear();
        let span = (radius / self.cell_size).ceil() as i64;
        let (cx, cy) = cell_key(x, y, self.cell_size);
        for dy in -span..=span {
            for dx in -span..=span {
                let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &idx in bucket {
                    if distance3(self.positions[idx], (x, y, z)) <= radius {
                        out.push(idx);
                    }
                }
            }
        }
    }

    /// All encounter pairs, deduplicated so each unordered pair appears
    /// once with the lower index first.
    ///
    /// `radius_of` yields the effective encounter radius per actor; a
    /// pair matches when its 3D distance is within the larger of the
    /// two radii. The scan widens to cover the largest radius so
    /// landmark-boosted actors still find every partner.
    #[must_use]
    pub fn pairs(&self, radius_of: impl Fn(usize) -> f64) -> Vec<(usize, usize)> {
        let max_radius = (0..self.positions.len())
            .map(&radius_of)
            .fold(0.0_f64, f64::max);
        if max_radius <= 0.0 {
            return Vec::new();
        }
        let span = (max_radius / self.cell_size).ceil() as i64;

        let mut out = Vec::new();
        for (&(cx, cy), bucket) in &self.cells {
            for &a in bucket {
                for dy in -span..=span {
                    for dx in -span..=span {
                        let Some(neighbors) = self.cells.get(&(cx + dx, cy + dy)) else {
                            continue;
                        };
                        for &b in neighbors {
                            if a >= b {
                                continue;
                            }
                            let reach = radius_of(a).max(radius_of(b));
                            if distance3(self.positions[a], self.positions[b]) <= reach {
                                out.push((a, b));
                            }
                        }
                    }
                }
            }
        }
        out.sort_unstable();
        out
    }
}

#[inline]
fn cell_key(x: f64, y: f64, cell_size: f64) -> (i64, i64) {
    ((x / cell_size).floor() as i64, (y / cell_size).floor() as i64)
}

#[inline]
fn distance3(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    let dz = a.2 - b.2;
    (dx * dx + dy * dy + dz * dz).sqrt()
}
