use crate::bounds::{Bounds, Location};
use crate::errors::{MapError, Result};
use ndarray::{Array1, Array2};

fn check_raster(nrows: usize, ncols: usize, bounds: &Bounds) -> Result<()> {
    if bounds.ndim() != 2 {
        return Err(MapError::InvalidGridError(format!(
            "rasters are 2D, got {}-dimensional bounds",
            bounds.ndim()
        )));
    }
    if nrows == 0 || ncols == 0 {
        return Err(MapError::InvalidGridError(format!(
            "raster shape should be non-empty, got ({nrows}, {ncols})"
        )));
    }
    Ok(())
}

fn cell_resolution(bounds: &Bounds, shape: (usize, usize)) -> Array1<f64> {
    let extents = bounds.extents();
    Array1::from_vec(vec![extents[0] / shape.0 as f64, extents[1] / shape.1 as f64])
}

pub(crate) fn cell_of(bounds: &Bounds, shape: (usize, usize), x: &Location) -> Option<(usize, usize)> {
    if !bounds.contains(x) {
        return None;
    }
    let res = cell_resolution(bounds, shape);
    // points on the upper edge fall into the last cell
    let i = (((x[0] - bounds.lower[0]) / res[0]).floor() as usize).min(shape.0 - 1);
    let j = (((x[1] - bounds.lower[1]) / res[1]).floor() as usize).min(shape.1 - 1);
    Some((i, j))
}

fn point_of(bounds: &Bounds, shape: (usize, usize), cell: (usize, usize)) -> Location {
    let res = cell_resolution(bounds, shape);
    Array1::from_vec(vec![
        bounds.lower[0] + (cell.0 as f64 + 0.5) * res[0],
        bounds.lower[1] + (cell.1 as f64 + 0.5) * res[1],
    ])
}

/// Traversability raster over a bounded 2D domain.
///
/// Cell `(i, j)` covers the rectangle starting at
/// `lower + (i·res_x, j·res_y)`; continuous locations are resolved to the
/// covering cell, locations outside the bounds are treated as occupied.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    cells: Array2<bool>,
    bounds: Bounds,
}

impl OccupancyGrid {
    /// Build a grid from an occupancy raster, `true` marking blocked cells.
    pub fn new(cells: Array2<bool>, bounds: Bounds) -> Result<OccupancyGrid> {
        check_raster(cells.nrows(), cells.ncols(), &bounds)?;
        Ok(OccupancyGrid { cells, bounds })
    }

    /// An all-free grid of the given shape.
    ///
    /// Panics if the shape is empty or the bounds are not 2D; use [`OccupancyGrid::new`]
    /// for fallible construction.
    pub fn free(shape: (usize, usize), bounds: Bounds) -> OccupancyGrid {
        match Self::new(Array2::from_elem(shape, false), bounds) {
            Ok(grid) => grid,
            Err(err) => panic!("{err}"),
        }
    }

    /// Domain bounds
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Raster shape (cells per axis)
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// Cell side lengths per axis
    pub fn resolution(&self) -> Array1<f64> {
        cell_resolution(&self.bounds, self.shape())
    }

    /// Cell covering a continuous location, `None` outside the bounds
    pub fn cell_of(&self, x: &Location) -> Option<(usize, usize)> {
        cell_of(&self.bounds, self.shape(), x)
    }

    /// Center of a cell in continuous coordinates
    pub fn point_of(&self, cell: (usize, usize)) -> Location {
        point_of(&self.bounds, self.shape(), cell)
    }

    /// Whether the location is blocked; locations outside the bounds are.
    pub fn is_occupied(&self, x: &Location) -> bool {
        match self.cell_of(x) {
            Some(cell) => self.is_occupied_cell(cell),
            None => true,
        }
    }

    /// Whether the cell is blocked; cells outside the raster are.
    pub fn is_occupied_cell(&self, cell: (usize, usize)) -> bool {
        match self.cells.get(cell) {
            Some(&occupied) => occupied,
            None => true,
        }
    }

    /// Mark one cell as blocked.
    pub fn occupy(&mut self, cell: (usize, usize)) {
        if let Some(c) = self.cells.get_mut(cell) {
            *c = true;
        }
    }

    /// Mark every cell whose center lies in the `[lo, hi]` rectangle as blocked.
    pub fn occupy_rect(&mut self, lo: &Location, hi: &Location) {
        let shape = self.shape();
        for i in 0..shape.0 {
            for j in 0..shape.1 {
                let center = self.point_of((i, j));
                if center[0] >= lo[0]
                    && center[0] <= hi[0]
                    && center[1] >= lo[1]
                    && center[1] <= hi[1]
                {
                    self.cells[(i, j)] = true;
                }
            }
        }
    }
}

/// Scalar values rasterized over a bounded 2D domain, looked up by nearest cell.
///
/// Backs simulated ground-truth sampling and prior maps.
#[derive(Debug, Clone)]
pub struct RasterField {
    data: Array2<f64>,
    bounds: Bounds,
}

impl RasterField {
    /// Build a field from a value raster.
    pub fn new(data: Array2<f64>, bounds: Bounds) -> Result<RasterField> {
        check_raster(data.nrows(), data.ncols(), &bounds)?;
        Ok(RasterField { data, bounds })
    }

    /// Rasterize `f` evaluated at cell centers.
    pub fn from_fn<F: Fn(&Location) -> f64>(
        shape: (usize, usize),
        bounds: Bounds,
        f: F,
    ) -> Result<RasterField> {
        check_raster(shape.0, shape.1, &bounds)?;
        let data = Array2::from_shape_fn(shape, |cell| f(&point_of(&bounds, shape, cell)));
        Ok(RasterField { data, bounds })
    }

    /// Domain bounds
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Raster shape (cells per axis)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Value of the cell covering `x`; out-of-bounds locations are projected
    /// onto the domain first.
    pub fn value_at(&self, x: &Location) -> f64 {
        let clamped = self.bounds.clamp(x);
        match cell_of(&self.bounds, self.shape(), &clamped) {
            Some(cell) => self.data[cell],
            None => f64::NAN,
        }
    }

    /// Largest absolute value over the raster
    pub fn max_abs(&self) -> f64 {
        self.data.fold(0., |acc, &v| acc.max(v.abs()))
    }
}
