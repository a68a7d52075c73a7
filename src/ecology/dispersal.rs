//! Neighborhood-averaged cover fields that gate establishment.

use crate::coverage::{CoverageState, Schema};
use crate::grid::{Landscape, Neighborhoods};
use rayon::prelude::*;

/// Per-cell dispersal values, laid out like [`CoverageState`].
#[derive(Clone, Debug, PartialEq)]
pub struct DispersalField {
    ncols: usize,
    values: Vec<f64>,
}

impl DispersalField {
    pub fn zeros(cells: usize, ncols: usize) -> Self {
        Self {
            ncols,
            values: vec![0.0; cells * ncols],
        }
    }

    #[inline]
    pub fn row(&self, cell: usize) -> &[f64] {
        &self.values[cell * self.ncols..(cell + 1) * self.ncols]
    }

    #[inline]
    pub fn get(&self, cell: usize, column: usize) -> f64 {
        self.values[cell * self.ncols + column]
    }
}

/// Computes dispersal fields over static neighbor lists.
#[derive(Clone, Debug)]
pub struct DispersalEngine {
    neighborhoods: Neighborhoods,
    /// Dispersing columns and their dispersal class (1..=3).
    dispersers: Vec<(usize, u8)>,
    ncols: usize,
}

impl DispersalEngine {
    pub fn new(landscape: &Landscape, schema: &Schema) -> Self {
        let dispersers = schema
            .definitions()
            .iter()
            .enumerate()
            .filter(|(_, def)| def.dispersal_class >= 1)
            .map(|(i, def)| (i, def.dispersal_class))
            .collect();
        Self {
            neighborhoods: Neighborhoods::build(landscape),
            dispersers,
            ncols: schema.len(),
        }
    }

    pub fn neighborhoods(&self) -> &Neighborhoods {
        &self.neighborhoods
    }

    /// Mean neighbor cover of every dispersing species.
    ///
    /// Reads only `cover`, so every cell sees the same snapshot and the pass
    /// runs in parallel.
    pub fn compute(&self, cover: &CoverageState) -> DispersalField {
        let mut field = DispersalField::zeros(cover.cells(), self.ncols);
        if self.ncols == 0 {
            return field;
        }

        field
            .values
            .par_chunks_mut(self.ncols)
            .enumerate()
            .for_each(|(cell, row)| {
                for &(column, class) in &self.dispersers {
                    let neighbors = self.neighborhoods.for_class(class, cell);
                    let total: f64 = neighbors.iter().map(|&n| cover.get(n, column)).sum();
                    row[column] = total / neighbors.len().max(1) as f64;
                }
            });

        field
    }
}
