//! Land/water correction toward an external land-fraction target.

use crate::coverage::{CoverageState, Schema};
use crate::drivers::EnvironmentalDrivers;
use crate::grid::Landscape;
use rayon::prelude::*;

/// What happened to one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// No target for this cell.
    NoTarget,
    /// Current land already equals the target.
    Unchanged,
    Gain,
    Loss,
    /// An edge condition prevented the correction.
    Skipped(&'static str),
}

/// Landscape-wide tally of a reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MorphologyReport {
    pub gained: usize,
    pub lost: usize,
    pub unchanged: usize,
    pub no_target: usize,
    pub skipped: usize,
}

impl MorphologyReport {
    fn record(&mut self, outcome: Reconciliation) {
        match outcome {
            Reconciliation::NoTarget => self.no_target += 1,
            Reconciliation::Unchanged => self.unchanged += 1,
            Reconciliation::Gain => self.gained += 1,
            Reconciliation::Loss => self.lost += 1,
            Reconciliation::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Move one cell's land fraction to `target`.
pub fn reconcile_cell(schema: &Schema, row: &mut [f64], target: f64) -> Reconciliation {
    let s = &schema.special;
    let g = &schema.groups;

    let current = schema.land_sum(row);
    if current == target {
        return Reconciliation::Unchanged;
    }

    // last year's new bareground is now old
    row[s.bare_old] += row[s.bare_new];
    row[s.bare_new] = 0.0;
    row[s.dead_flt] = 0.0;

    if current < target {
        let current_water = 1.0 - (current + row[s.notmod]);
        if current_water <= 0.0 {
            return Reconciliation::Skipped("land gain requested on a cell without water");
        }
        let target_water = 1.0 - (target + row[s.notmod]);
        let scale = (target_water / current_water).max(0.0);
        row[s.bare_new] += target - current;
        row[s.water] *= scale;
        row[s.sav] *= scale;
        return Reconciliation::Gain;
    }

    let delta = current - target;
    if row[s.water] + row[s.notmod] == 1.0 {
        return Reconciliation::Skipped("land loss requested on a cell of water and unmodeled area");
    }
    if row[s.bare_old] >= delta {
        row[s.bare_old] -= delta;
        row[s.water] += delta;
        return Reconciliation::Loss;
    }

    let base: f64 = g.erodible.iter().map(|&c| row[c]).sum();
    if base <= 0.0 {
        return Reconciliation::Skipped("land loss requested with no erodible vegetation");
    }
    // floating mats and their bareground are outside the base, so the
    // remainder can exceed it; vegetation then erodes completely
    let remainder = delta - row[s.bare_old];
    let scale = ((base - remainder) / base).max(0.0);
    let freed = row[s.bare_old] + base * (1.0 - scale);
    row[s.bare_old] = 0.0;
    for &c in &g.erodible {
        row[c] *= scale;
    }
    row[s.water] += freed;
    Reconciliation::Loss
}

/// Applies [`reconcile_cell`] to every cell with a target.
#[derive(Clone, Copy, Debug, Default)]
pub struct MorphologyReconciler;

impl MorphologyReconciler {
    pub fn reconcile(
        &self,
        schema: &Schema,
        landscape: &Landscape,
        cover: &mut CoverageState,
        drivers: &EnvironmentalDrivers,
    ) -> MorphologyReport {
        let ncols = cover.columns();
        let outcomes: Vec<Reconciliation> = cover
            .as_mut_slice()
            .par_chunks_mut(ncols)
            .enumerate()
            .map(|(cell, row)| match drivers.land_target(cell) {
                Some(target) => reconcile_cell(schema, row, target),
                None => Reconciliation::NoTarget,
            })
            .collect();

        let mut report = MorphologyReport::default();
        for (cell, outcome) in outcomes.into_iter().enumerate() {
            if let Reconciliation::Skipped(reason) = outcome {
                log::debug!("cell {}: {}", landscape.cell(cell).id, reason);
            }
            report.record(outcome);
        }
        report
    }
}
