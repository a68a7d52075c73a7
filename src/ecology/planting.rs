//! Exogenous plantings applied after the ecological update.

use crate::coverage::{ColumnKind, CoverageState, Schema};
use crate::error::{ModelError, Problems, Result};
use crate::grid::Landscape;
use crate::io::PlantingRecord;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Largest overshoot of the cover sum a planting may cause before it is
/// treated as a logic error.
pub const PLANTING_TOLERANCE: f64 = 0.01;

/// A planting record resolved against the schema and the landscape.
#[derive(Clone, Debug, PartialEq)]
pub struct Planting {
    pub cell: usize,
    pub row: usize,
    pub col: usize,
    pub fraction: f64,
    /// Schema column and share of the planted area.
    pub species: Vec<(usize, f64)>,
}

/// Plantings grouped by year.
#[derive(Clone, Debug, Default)]
pub struct PlantingSchedule {
    by_year: BTreeMap<i32, Vec<Planting>>,
}

impl PlantingSchedule {
    /// Resolve every record, collecting all problems before failing.
    pub fn build(
        records: Vec<PlantingRecord>,
        schema: &Schema,
        landscape: &Landscape,
        years: RangeInclusive<i32>,
    ) -> Result<Self> {
        let mut problems = Problems::new();
        let mut by_year: BTreeMap<i32, Vec<Planting>> = BTreeMap::new();

        for record in records {
            let at = format!("planting {} at row {}, col {}", record.year, record.row, record.col);
            let mut ok = true;

            if !years.contains(&record.year) {
                problems.push(format!(
                    "{}: year outside the simulated years {}..={}",
                    at,
                    years.start(),
                    years.end()
                ));
                ok = false;
            }
            let cell = landscape.index_at(record.row, record.col);
            if cell.is_none() {
                problems.push(format!("{}: not an active cell", at));
                ok = false;
            }

            let mut species = Vec::with_capacity(record.species.len());
            let mut total = 0.0;
            for (code, share) in &record.species {
                match schema.column(code) {
                    Some(column) if schema.kind(column) == ColumnKind::Species && column != schema.special.sav => {
                        species.push((column, *share));
                    }
                    Some(_) => {
                        problems.push(format!("{}: {} cannot be planted", at, code));
                        ok = false;
                    }
                    None => {
                        problems.push(format!("{}: unknown species {}", at, code));
                        ok = false;
                    }
                }
                if *share < 0.0 {
                    problems.push(format!("{}: negative cover {} for {}", at, share, code));
                    ok = false;
                }
                total += share;
            }
            if total > 1.0 {
                problems.push(format!("{}: species cover sums to {}", at, total));
                ok = false;
            }

            if let (true, Some(cell)) = (ok, cell) {
                by_year.entry(record.year).or_default().push(Planting {
                    cell,
                    row: record.row,
                    col: record.col,
                    fraction: record.fraction,
                    species,
                });
            }
        }

        problems.finish(Self { by_year })
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.by_year.keys().copied()
    }

    pub fn for_year(&self, year: i32) -> &[Planting] {
        self.by_year.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_year.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_year.is_empty()
    }
}

/// What a planting did to its cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlantingOutcome {
    /// The cell held no land.
    Skipped,
    Planted,
    /// Planted, then scaled back to a cover sum of 1.
    Renormalized,
}

/// Apply one planting to a cell's coverage row.
pub fn plant_cell(schema: &Schema, row: &mut [f64], planting: &Planting) -> Result<PlantingOutcome> {
    let s = &schema.special;
    let g = &schema.groups;

    // drift can push SAV + WATER just past 1
    let available = 1.0 - (row[s.sav] + row[s.water]);
    if available <= 0.0 {
        return Ok(PlantingOutcome::Skipped);
    }
    let freed = planting.fraction.min(available);
    let scale = (available - freed) / available;

    for &c in &g.plantable {
        row[c] *= scale;
    }
    for &(column, share) in &planting.species {
        row[column] += share * freed;
    }

    let total = schema.cover_sum(row);
    if total - 1.0 > PLANTING_TOLERANCE {
        return Err(ModelError::Planting {
            row: planting.row,
            col: planting.col,
            message: format!(
                "total cover {:.6} after freeing {:.6} of {:.6} available land",
                total, freed, available
            ),
        });
    }
    if total > 1.0 {
        for &c in &g.counted {
            row[c] /= total;
        }
        Ok(PlantingOutcome::Renormalized)
    } else {
        row[s.bare_old] += 1.0 - total;
        Ok(PlantingOutcome::Planted)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlantingReport {
    pub planted: usize,
    pub renormalized: usize,
    pub skipped: usize,
}

/// Applies a year's plantings in record order.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlantingInjector;

impl PlantingInjector {
    pub fn apply(&self, schema: &Schema, cover: &mut CoverageState, plantings: &[Planting]) -> Result<PlantingReport> {
        let mut report = PlantingReport::default();
        for planting in plantings {
            match plant_cell(schema, cover.row_mut(planting.cell), planting)? {
                PlantingOutcome::Skipped => {
                    log::debug!("planting at row {}, col {} skipped: no land", planting.row, planting.col);
                    report.skipped += 1;
                }
                PlantingOutcome::Planted => report.planted += 1,
                PlantingOutcome::Renormalized => {
                    report.planted += 1;
                    report.renormalized += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::tests::sav;
    use crate::coverage::{BAREGRND_OLD, WATER};
    use crate::grid::tests::id_raster;
    use crate::species::tests::emergent;

    fn schema() -> Schema {
        Schema::new(vec![emergent("A", 0.0, 0.0, 0), emergent("B", 0.0, 0.0, 0), sav()]).unwrap()
    }

    fn planting(schema: &Schema, fraction: f64, species: &[(&str, f64)]) -> Planting {
        Planting {
            cell: 0,
            row: 0,
            col: 0,
            fraction,
            species: species
                .iter()
                .map(|(code, share)| (schema.column(code).unwrap(), *share))
                .collect(),
        }
    }

    fn row_for(schema: &Schema, values: &[(&str, f64)]) -> Vec<f64> {
        let mut row = vec![0.0; schema.len()];
        for (name, v) in values {
            row[schema.column(name).unwrap()] = *v;
        }
        row
    }

    fn value(schema: &Schema, row: &[f64], name: &str) -> f64 {
        row[schema.column(name).unwrap()]
    }

    #[test]
    fn test_planting_frees_land() {
        let schema = schema();
        let mut row = row_for(&schema, &[("A", 0.5), (WATER, 0.5)]);
        let outcome = plant_cell(&schema, &mut row, &planting(&schema, 0.2, &[("B", 1.0)])).unwrap();
        assert_ne!(outcome, PlantingOutcome::Skipped);
        assert!((value(&schema, &row, "A") - 0.3).abs() < 1e-12);
        assert!((value(&schema, &row, "B") - 0.2).abs() < 1e-12);
        assert_eq!(value(&schema, &row, WATER), 0.5);
        assert!((schema.cover_sum(&row) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fraction_capped_by_available_land() {
        let schema = schema();
        let mut row = row_for(&schema, &[("A", 0.3), (WATER, 0.7)]);
        plant_cell(&schema, &mut row, &planting(&schema, 0.5, &[("B", 1.0)])).unwrap();
        assert_eq!(value(&schema, &row, "A"), 0.0);
        assert!((value(&schema, &row, "B") - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_unplanted_share_becomes_old_bareground() {
        let schema = schema();
        let mut row = row_for(&schema, &[("A", 1.0)]);
        let outcome = plant_cell(&schema, &mut row, &planting(&schema, 0.2, &[("B", 0.5)])).unwrap();
        assert_eq!(outcome, PlantingOutcome::Planted);
        assert!((value(&schema, &row, "A") - 0.8).abs() < 1e-12);
        assert!((value(&schema, &row, "B") - 0.1).abs() < 1e-12);
        assert!((value(&schema, &row, BAREGRND_OLD) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_small_overshoot_renormalized() {
        let schema = schema();
        let mut row = row_for(&schema, &[("A", 0.505), (WATER, 0.5)]);
        let outcome = plant_cell(&schema, &mut row, &planting(&schema, 0.1, &[("B", 1.0)])).unwrap();
        assert_eq!(outcome, PlantingOutcome::Renormalized);
        assert!((schema.cover_sum(&row) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_large_overshoot_is_fatal() {
        let schema = schema();
        let mut row = row_for(&schema, &[("A", 0.52), (WATER, 0.5)]);
        let err = plant_cell(&schema, &mut row, &planting(&schema, 0.1, &[("B", 1.0)])).unwrap_err();
        assert!(matches!(err, ModelError::Planting { row: 0, col: 0, .. }));
    }

    #[test]
    fn test_water_cell_skipped() {
        let schema = schema();
        let mut row = row_for(&schema, &[("SAV", 0.25), (WATER, 0.75)]);
        let before = row.clone();
        let outcome = plant_cell(&schema, &mut row, &planting(&schema, 0.5, &[("A", 1.0)])).unwrap();
        assert_eq!(outcome, PlantingOutcome::Skipped);
        assert_eq!(row, before);
    }

    #[test]
    fn test_drifted_water_cell_skipped() {
        let schema = schema();
        let mut row = row_for(&schema, &[("SAV", 0.502), (WATER, 0.5)]);
        let before = row.clone();
        let outcome = plant_cell(&schema, &mut row, &planting(&schema, 0.5, &[("B", 1.0)])).unwrap();
        assert_eq!(outcome, PlantingOutcome::Skipped);
        assert_eq!(row, before);
        assert!(row.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_schedule_groups_by_year() {
        let schema = schema();
        let landscape = Landscape::from_raster(id_raster(2, 2, &[])).unwrap();
        let record = |year, row, col| PlantingRecord {
            year,
            row,
            col,
            fraction: 0.5,
            species: vec![("A".to_string(), 1.0)],
        };
        let schedule = PlantingSchedule::build(
            vec![record(2003, 0, 1), record(2001, 1, 1), record(2003, 1, 0)],
            &schema,
            &landscape,
            2000..=2005,
        )
        .unwrap();
        assert_eq!(schedule.years().collect::<Vec<_>>(), vec![2001, 2003]);
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.for_year(2003)[1].cell, landscape.index_at(1, 0).unwrap());
        assert!(schedule.for_year(2002).is_empty());
    }

    #[test]
    fn test_schedule_reports_every_problem() {
        let schema = schema();
        let landscape = Landscape::from_raster(id_raster(2, 2, &[(1, 1)])).unwrap();
        let records = vec![
            PlantingRecord {
                year: 1990,
                row: 0,
                col: 0,
                fraction: 0.5,
                species: vec![("A".to_string(), 1.0)],
            },
            PlantingRecord {
                year: 2001,
                row: 1,
                col: 1,
                fraction: 0.5,
                species: vec![("ZZZ".to_string(), 0.5), (WATER.to_string(), 0.2)],
            },
            PlantingRecord {
                year: 2001,
                row: 0,
                col: 1,
                fraction: 0.5,
                species: vec![("A".to_string(), 0.7), ("B".to_string(), 0.6)],
            },
        ];
        let err = PlantingSchedule::build(records, &schema, &landscape, 2000..=2005).unwrap_err();
        let problems = err.problems();
        assert_eq!(problems.len(), 5);
        assert!(problems[0].contains("year outside"));
        assert!(problems[1].contains("not an active cell"));
        assert!(problems[2].contains("unknown species ZZZ"));
        assert!(problems[3].contains("WATER cannot be planted"));
        assert!(problems[4].contains("sums to"));
    }

    #[test]
    fn test_injector_applies_in_order() {
        let schema = schema();
        let mut cover = CoverageState::zeros(1, schema.len());
        cover.set(0, schema.column("A").unwrap(), 1.0);
        let plantings = vec![
            planting(&schema, 0.5, &[("B", 1.0)]),
            planting(&schema, 0.5, &[("A", 1.0)]),
        ];
        let report = PlantingInjector.apply(&schema, &mut cover, &plantings).unwrap();
        assert_eq!(report.planted, 2);
        // A: 1.0 -> 0.5 -> 0.25 + 0.5
        assert!((cover.get(0, schema.column("A").unwrap()) - 0.75).abs() < 1e-12);
        assert!((cover.get(0, schema.column("B").unwrap()) - 0.25).abs() < 1e-12);
    }
}
