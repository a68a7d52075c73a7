//! Raster grids, the active-cell index and precomputed neighborhoods.

use crate::error::{ModelError, Result};
use ndarray::Array2;
use std::collections::HashMap;

/// ESRI ASCII grid header.
#[derive(Clone, Debug, PartialEq)]
pub struct GridHeader {
    pub nrows: usize,
    pub ncols: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata_value: f64,
}

impl GridHeader {
    /// Whether two grids cover the same cells.
    pub fn same_shape(&self, other: &GridHeader) -> bool {
        self.nrows == other.nrows && self.ncols == other.ncols
    }
}

/// Header plus a row-major matrix of values.
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    pub header: GridHeader,
    pub data: Array2<f64>,
}

impl Raster {
    pub fn new(header: GridHeader, data: Array2<f64>) -> Self {
        Self { header, data }
    }

    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        value == self.header.nodata_value
    }

    #[inline]
    pub fn has_data_at(&self, row: usize, col: usize) -> bool {
        !self.is_nodata(self.data[[row, col]])
    }
}

/// One modeled cell of the landscape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveCell {
    pub id: i64,
    pub row: usize,
    pub col: usize,
}

/// The CellID raster with its active (non-nodata) cells in row-major order.
#[derive(Clone, Debug)]
pub struct Landscape {
    pub ids: Raster,
    cells: Vec<ActiveCell>,
    /// Active-cell index of each raster position.
    lookup: Array2<Option<usize>>,
    by_id: HashMap<i64, usize>,
}

impl Landscape {
    pub fn from_raster(ids: Raster) -> Result<Self> {
        let (nrows, ncols) = ids.data.dim();
        let mut cells = Vec::new();
        let mut lookup = Array2::from_elem((nrows, ncols), None);
        let mut by_id = HashMap::new();

        for ((row, col), &value) in ids.data.indexed_iter() {
            if ids.is_nodata(value) {
                continue;
            }
            if value.fract() != 0.0 {
                return Err(ModelError::grid(
                    "cell id raster",
                    format!("non-integer cell id {} at row {}, col {}", value, row, col),
                ));
            }
            let id = value as i64;
            let index = cells.len();
            if by_id.insert(id, index).is_some() {
                return Err(ModelError::grid(
                    "cell id raster",
                    format!("duplicate cell id {} at row {}, col {}", id, row, col),
                ));
            }
            lookup[[row, col]] = Some(index);
            cells.push(ActiveCell { id, row, col });
        }

        Ok(Self {
            ids,
            cells,
            lookup,
            by_id,
        })
    }

    pub fn header(&self) -> &GridHeader {
        &self.ids.header
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[ActiveCell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> ActiveCell {
        self.cells[index]
    }

    /// Active-cell index at a raster position, `None` outside the grid or on nodata.
    pub fn index_at(&self, row: usize, col: usize) -> Option<usize> {
        self.lookup.get([row, col]).copied().flatten()
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// Gather the value of a raster at every active cell.
    pub fn sample(&self, raster: &Raster) -> Vec<f64> {
        self.cells.iter().map(|c| raster.data[[c.row, c.col]]).collect()
    }

    /// Active neighbors within a square of `radius`, excluding the cell itself.
    fn neighbors_within(&self, cell: ActiveCell, radius: usize) -> Vec<usize> {
        let (nrows, ncols) = self.lookup.dim();
        let row_min = cell.row.saturating_sub(radius);
        let row_max = (cell.row + radius).min(nrows - 1);
        let col_min = cell.col.saturating_sub(radius);
        let col_max = (cell.col + radius).min(ncols - 1);

        let mut result = Vec::with_capacity((2 * radius + 1).pow(2) - 1);
        for row in row_min..=row_max {
            for col in col_min..=col_max {
                if row == cell.row && col == cell.col {
                    continue;
                }
                if let Some(index) = self.lookup[[row, col]] {
                    result.push(index);
                }
            }
        }
        result
    }
}

/// Static neighbor lists of every active cell.
#[derive(Clone, Debug)]
pub struct Neighborhoods {
    /// Up to 8 Moore neighbors.
    pub moore: Vec<Vec<usize>>,
    /// Up to 24 neighbors within radius 2.
    pub radius2: Vec<Vec<usize>>,
}

impl Neighborhoods {
    pub fn build(landscape: &Landscape) -> Self {
        let moore = landscape
            .cells()
            .iter()
            .map(|&c| landscape.neighbors_within(c, 1))
            .collect();
        let radius2 = landscape
            .cells()
            .iter()
            .map(|&c| landscape.neighbors_within(c, 2))
            .collect();
        Self { moore, radius2 }
    }

    /// Neighbor list used by a dispersal class; class 0 has none.
    pub fn for_class(&self, dispersal_class: u8, cell: usize) -> &[usize] {
        match dispersal_class {
            0 => &[],
            1 => &self.moore[cell],
            _ => &self.radius2[cell],
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::Array2;

    pub(crate) fn header(nrows: usize, ncols: usize) -> GridHeader {
        GridHeader {
            nrows,
            ncols,
            xllcorner: 0.0,
            yllcorner: 0.0,
            cellsize: 480.0,
            nodata_value: -9999.0,
        }
    }

    /// Cell ids 1..=n in row-major order, with the given positions set to nodata.
    pub(crate) fn id_raster(nrows: usize, ncols: usize, holes: &[(usize, usize)]) -> Raster {
        let mut data = Array2::from_shape_fn((nrows, ncols), |(r, c)| (r * ncols + c + 1) as f64);
        for &(r, c) in holes {
            data[[r, c]] = -9999.0;
        }
        Raster::new(header(nrows, ncols), data)
    }

    #[test]
    fn test_active_cells_skip_nodata() {
        let landscape = Landscape::from_raster(id_raster(3, 3, &[(1, 1)])).unwrap();
        assert_eq!(landscape.len(), 8);
        assert_eq!(landscape.index_at(1, 1), None);
        assert_eq!(landscape.index_at(1, 2), Some(4));
        assert_eq!(landscape.index_at(5, 5), None);
        assert_eq!(landscape.index_of(9), Some(7));
        assert_eq!(landscape.cell(7), ActiveCell { id: 9, row: 2, col: 2 });
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut raster = id_raster(2, 2, &[]);
        raster.data[[1, 1]] = 1.0;
        assert!(Landscape::from_raster(raster).is_err());
    }

    #[test]
    fn test_neighborhood_sizes() {
        let landscape = Landscape::from_raster(id_raster(5, 5, &[])).unwrap();
        let n = Neighborhoods::build(&landscape);
        let center = landscape.index_at(2, 2).unwrap();
        assert_eq!(n.moore[center].len(), 8);
        assert_eq!(n.radius2[center].len(), 24);
        assert!(!n.moore[center].contains(&center));

        let corner = landscape.index_at(0, 0).unwrap();
        assert_eq!(n.moore[corner].len(), 3);
        assert_eq!(n.radius2[corner].len(), 8);
    }

    #[test]
    fn test_neighborhood_excludes_nodata() {
        let landscape = Landscape::from_raster(id_raster(3, 3, &[(0, 0), (0, 1)])).unwrap();
        let n = Neighborhoods::build(&landscape);
        let center = landscape.index_at(1, 1).unwrap();
        assert_eq!(n.moore[center].len(), 6);
        assert!(n.for_class(0, center).is_empty());
        assert_eq!(n.for_class(3, center).len(), 6);
    }
}
