//! Annual coverage update of a single cell.
//!
//! The steps below run in a fixed order; reordering them changes the
//! ecology even though every order conserves cover.

use super::dispersal::DispersalField;
use crate::coverage::{CoverageState, Schema, COVER_TOLERANCE};
use crate::drivers::EnvironmentalDrivers;
use crate::error::Result;
use crate::grid::Landscape;
use crate::species::{CellContext, MatKind, FFIBS_UNSCORED};
use rayon::prelude::*;

/// Likelihoods of one species at one cell.
#[derive(Clone, Copy, Debug)]
struct Likelihood {
    column: usize,
    senescence: f64,
    growth: f64,
    spread: f64,
}

/// Result of updating one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellUpdate {
    /// Sum of counted columns after the update.
    pub cover_sum: f64,
}

impl CellUpdate {
    pub fn within_tolerance(&self) -> bool {
        (1.0 - COVER_TOLERANCE..=1.0 + COVER_TOLERANCE).contains(&self.cover_sum)
    }
}

/// Landscape-wide outcome of an ecology pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EcologyReport {
    pub cells: usize,
    pub drifted: usize,
}

fn distribute(row: &mut [f64], shares: impl Iterator<Item = (usize, f64)>, total: f64, area: f64) {
    for (column, share) in shares {
        row[column] += share / total * area;
    }
}

/// Update one cell in place.
pub fn update_cell(schema: &Schema, row: &mut [f64], ctx: &CellContext<'_>, first_year: bool) -> Result<CellUpdate> {
    let s = &schema.special;
    let g = &schema.groups;

    let terrestrial = g
        .terrestrial
        .iter()
        .map(|&column| {
            let def = schema.definition(column);
            Ok(Likelihood {
                column,
                senescence: def.senescence(ctx)?,
                growth: def.growth(ctx, ctx.dispersal[column])?,
                spread: def.spread(ctx)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Step 1: colonization of last year's new bareground
    if row[s.bare_new] > 0.0 {
        let spread_total: f64 = terrestrial.iter().map(|l| l.spread).sum();
        if spread_total > 0.0 {
            let area = row[s.bare_new];
            distribute(row, terrestrial.iter().map(|l| (l.column, l.spread)), spread_total, area);
        } else {
            row[s.bare_old] += row[s.bare_new];
        }
    }
    row[s.bare_new] = 0.0;

    // Step 2: senescence of rooted vegetation
    let mut lost = 0.0;
    let mut growth_total = 0.0;
    let mut spread_total = 0.0;
    for l in &terrestrial {
        let death = l.senescence * row[l.column];
        row[l.column] -= death;
        lost += death;
        growth_total += l.growth;
        spread_total += l.spread;
    }
    row[s.bare_new] = lost;

    // Step 3
    let unoccupied = lost + row[s.bare_old];

    // Step 4: establishment on unoccupied area, spread only after the first year
    if growth_total > 0.0 {
        distribute(row, terrestrial.iter().map(|l| (l.column, l.growth)), growth_total, unoccupied);
        row[s.bare_new] = 0.0;
        row[s.bare_old] = 0.0;
    } else if spread_total > 0.0 && !first_year {
        distribute(row, terrestrial.iter().map(|l| (l.column, l.spread)), spread_total, unoccupied);
        row[s.bare_new] = 0.0;
        row[s.bare_old] = 0.0;
    }

    // Step 5: floating mats
    let mut dead_thin = 0.0;
    let mut dead_thick = 0.0;
    let mut floating_growth = Vec::with_capacity(g.floating.len());
    let mut floating_total = 0.0;
    for &(column, mat) in &g.floating {
        let def = schema.definition(column);
        let death = def.senescence(ctx)? * row[column];
        row[column] -= death;
        match mat {
            MatKind::Thin => dead_thin += death,
            MatKind::Thick => dead_thick += death,
        }
        let growth = def.growth(ctx, ctx.dispersal[column])?;
        floating_total += growth;
        floating_growth.push((column, growth));
    }
    if floating_total > 0.0 {
        let area = dead_thin + dead_thick + row[s.bare_flt];
        row[s.bare_flt] = 0.0;
        distribute(row, floating_growth.into_iter(), floating_total, area);
    } else {
        let sunk = dead_thin + row[s.bare_flt];
        row[s.water] += sunk;
        row[s.dead_flt] += sunk;
        row[s.bare_flt] = dead_thick;
    }

    // Step 6: SAV and open water share the water area
    let water_area = row[s.sav] + row[s.water];
    let sav_growth = schema.definition(s.sav).growth(ctx, ctx.dispersal[s.sav])?;
    row[s.sav] = sav_growth * water_area;
    row[s.water] = water_area - row[s.sav];

    // Step 7: acute salinity stress
    if ctx.drivers.acute_salinity_stress {
        for &(column, mat) in &g.floating {
            let cover = row[column];
            row[column] = 0.0;
            match mat {
                MatKind::Thin => {
                    row[s.water] += cover;
                    row[s.dead_flt] += cover;
                }
                MatKind::Thick => row[s.bare_flt] += cover,
            }
        }
        for &column in &g.fresh_emergent {
            row[s.bare_new] += row[column];
            row[column] = 0.0;
        }
    }

    // Step 8
    let update = CellUpdate {
        cover_sum: schema.cover_sum(row),
    };

    // Step 9: derived metrics
    let (score_sum, scored_cover) = g.scored.iter().fold((0.0, 0.0), |(v, c), &column| {
        let score = schema.definition(column).ffibs_score.unwrap_or_default();
        (v + score * row[column], c + row[column])
    });
    row[s.ffibs] = if scored_cover > 0.0 {
        score_sum / scored_cover
    } else {
        FFIBS_UNSCORED
    };

    let island: f64 = g.barrier_island.iter().map(|&c| row[c]).sum();
    let vegetated = scored_cover + island;
    for (k, &target) in s.land_share.iter().enumerate() {
        row[target] = if vegetated > 0.0 {
            g.land_share[k].iter().map(|&c| row[c]).sum::<f64>() / vegetated
        } else {
            0.0
        };
    }

    Ok(update)
}

/// Runs [`update_cell`] over the landscape.
#[derive(Clone, Copy, Debug, Default)]
pub struct PatchEcologyEngine;

impl PatchEcologyEngine {
    /// Update every cell from its own state, the drivers and the dispersal field.
    ///
    /// Cells are independent, so the pass runs in parallel; the first error in
    /// cell order is returned.
    pub fn update(
        &self,
        schema: &Schema,
        landscape: &Landscape,
        cover: &mut CoverageState,
        drivers: &EnvironmentalDrivers,
        field: &DispersalField,
        first_year: bool,
    ) -> Result<EcologyReport> {
        let ncols = cover.columns();
        let results: Vec<Result<CellUpdate>> = cover
            .as_mut_slice()
            .par_chunks_mut(ncols)
            .enumerate()
            .map(|(cell, row)| {
                let ctx = CellContext {
                    cell_id: landscape.cell(cell).id,
                    drivers: drivers.cell(cell),
                    dispersal: field.row(cell),
                };
                update_cell(schema, row, &ctx, first_year)
            })
            .collect();

        let mut report = EcologyReport {
            cells: results.len(),
            drifted: 0,
        };
        for (cell, result) in results.into_iter().enumerate() {
            let update = result?;
            if !update.within_tolerance() {
                report.drifted += 1;
                log::warn!(
                    "cell {}: cover sum {:.6} outside 1 +/- {}",
                    landscape.cell(cell).id,
                    update.cover_sum,
                    COVER_TOLERANCE
                );
            }
        }
        Ok(report)
    }
}
