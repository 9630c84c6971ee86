//! Static occupancy queries.
//!
//! The planners only ever ask one question of the static world: is this
//! position blocked? Grid maps answer it from an ASCII `.map` raster;
//! georeferenced formats are parsed by an external collaborator and arrive
//! through [`crate::executive::Executive::set_map`].

use crate::error::{NavError, Result};
use std::path::Path;

/// Static occupancy query.
pub trait Map: Send + Sync {
    /// Whether the position is inside a blocked cell. Positions outside the
    /// mapped area are unblocked.
    fn is_blocked(&self, x: f64, y: f64) -> bool;

    /// Distance to the nearest blocked cell within `radius`, if any.
    ///
    /// The default implementation scans the surrounding cells at `step`
    /// spacing; grid maps answer from their own resolution.
    fn nearest_blocked_distance(&self, x: f64, y: f64, radius: f64, step: f64) -> Option<f64> {
        let mut best: Option<f64> = None;
        let n = (radius / step).ceil() as i32;
        for i in -n..=n {
            for j in -n..=n {
                let cx = x + i as f64 * step;
                let cy = y + j as f64 * step;
                if self.is_blocked(cx, cy) {
                    let d = ((cx - x).powi(2) + (cy - y).powi(2)).sqrt();
                    if d <= radius && best.is_none_or(|b| d < b) {
                        best = Some(d);
                    }
                }
            }
        }
        best
    }
}

/// The empty map: nothing is ever blocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMap;

impl Map for EmptyMap {
    fn is_blocked(&self, _x: f64, _y: f64) -> bool {
        false
    }

    fn nearest_blocked_distance(&self, _x: f64, _y: f64, _radius: f64, _step: f64) -> Option<f64> {
        None
    }
}

/// A rectangular occupancy grid anchored at the origin.
///
/// Row 0 is the northernmost row; cell (0, 0) of the bottom row covers
/// `[0, resolution) × [0, resolution)` in map coordinates.
#[derive(Debug, Clone)]
pub struct GridMap {
    blocked: Vec<bool>,
    cols: usize,
    rows: usize,
    resolution: f64,
}

impl GridMap {
    /// Build a grid from row-major cell data, northernmost row first.
    pub fn new(blocked: Vec<bool>, cols: usize, resolution: f64) -> Result<Self> {
        if cols == 0 || blocked.len() % cols != 0 {
            return Err(NavError::MapLoad(format!(
                "grid size {} is not a multiple of {} columns",
                blocked.len(),
                cols
            )));
        }
        if resolution <= 0.0 {
            return Err(NavError::MapLoad("non-positive resolution".into()));
        }
        let rows = blocked.len() / cols;
        Ok(Self {
            blocked,
            cols,
            rows,
            resolution,
        })
    }

    /// Parse an ASCII `.map` raster.
    ///
    /// The first line is the cell resolution in meters; each following line
    /// is one row of cells, `#` blocked, anything else clear. The first data
    /// line is the northernmost row.
    pub fn from_map_text(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let resolution: f64 = lines
            .next()
            .ok_or_else(|| NavError::MapLoad("empty map file".into()))?
            .trim()
            .parse()
            .map_err(|e| NavError::MapLoad(format!("bad resolution line: {}", e)))?;

        let rows: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
        if rows.is_empty() {
            return Err(NavError::MapLoad("map file has no rows".into()));
        }
        let cols = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut blocked = Vec::with_capacity(rows.len() * cols);
        for row in &rows {
            let mut count = 0;
            for c in row.chars() {
                blocked.push(c == '#');
                count += 1;
            }
            // Ragged short rows pad as clear water.
            blocked.extend(std::iter::repeat(false).take(cols - count));
        }
        Self::new(blocked, cols, resolution)
    }

    /// Load an ASCII `.map` file from disk.
    pub fn from_map_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_map_text(&text)
    }

    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    fn cell(&self, x: f64, y: f64) -> Option<bool> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let col = (x / self.resolution) as usize;
        // y grows northward, rows are stored north-first
        let row_from_south = (y / self.resolution) as usize;
        if col >= self.cols || row_from_south >= self.rows {
            return None;
        }
        let row = self.rows - 1 - row_from_south;
        Some(self.blocked[row * self.cols + col])
    }
}

impl Map for GridMap {
    fn is_blocked(&self, x: f64, y: f64) -> bool {
        self.cell(x, y).unwrap_or(false)
    }

    fn nearest_blocked_distance(&self, x: f64, y: f64, radius: f64, _step: f64) -> Option<f64> {
        // Scan at native resolution
        let mut best: Option<f64> = None;
        let n = (radius / self.resolution).ceil() as i32;
        for i in -n..=n {
            for j in -n..=n {
                let cx = x + i as f64 * self.resolution;
                let cy = y + j as f64 * self.resolution;
                if self.is_blocked(cx, cy) {
                    let d = ((cx - x).powi(2) + (cy - y).powi(2)).sqrt();
                    if d <= radius && best.is_none_or(|b| d < b) {
                        best = Some(d);
                    }
                }
            }
        }
        best
    }
}
