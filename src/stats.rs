//! Statistics tracking for the simulation.

use crate::coverage::{ColumnKind, CoverageState, Schema};
use crate::ecology::{EcologyReport, MorphologyReport, PlantingReport};
use crate::error::{ModelError, Result};
use crate::species::FFIBS_UNSCORED;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Landscape-wide statistics for one simulated year
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct YearSummary {
    /// Simulated year
    pub year: i32,
    /// Active cells
    pub cells: usize,
    /// Mean land fraction
    pub land_mean: f64,
    /// Mean open water fraction
    pub water_mean: f64,
    /// Mean FFIBS over cells holding scored species
    pub ffibs_mean: Option<f64>,
    /// Mean cover of every counted column, in schema order
    pub cover_means: Vec<(String, f64)>,
    /// Cells whose cover sum drifted outside tolerance
    pub drifted: usize,
    /// Cells adjusted by land/water reconciliation
    pub reconciled: usize,
    /// Cells reconciliation had to skip
    pub reconcile_skipped: usize,
    /// Plantings applied
    pub planted: usize,
}

impl YearSummary {
    /// Collect statistics from the coverage state after the ecological update
    pub fn collect(year: i32, schema: &Schema, cover: &CoverageState, ecology: &EcologyReport) -> Self {
        let cells = cover.cells();
        let mean = |total: f64| if cells == 0 { 0.0 } else { total / cells as f64 };

        let land_mean = mean(cover.rows().map(|r| schema.land_sum(r)).sum());
        let water_mean = cover.column_mean(schema.special.water);

        let (ffibs_total, scored) = cover
            .rows()
            .map(|r| r[schema.special.ffibs])
            .filter(|&v| v != FFIBS_UNSCORED)
            .fold((0.0, 0usize), |(t, n), v| (t + v, n + 1));
        let ffibs_mean = (scored > 0).then(|| ffibs_total / scored as f64);

        let cover_means = schema
            .groups
            .counted
            .iter()
            .map(|&c| (schema.name(c).to_string(), cover.column_mean(c)))
            .collect();

        Self {
            year,
            cells,
            land_mean,
            water_mean,
            ffibs_mean,
            cover_means,
            drifted: ecology.drifted,
            ..Default::default()
        }
    }

    pub fn add_morphology(&mut self, report: &MorphologyReport) {
        self.reconciled += report.gained + report.lost;
        self.reconcile_skipped += report.skipped;
    }

    pub fn add_plantings(&mut self, report: &PlantingReport) {
        self.planted += report.planted;
    }

    /// Species with the largest mean cover, ignoring bareground and water columns
    pub fn dominant(&self, schema: &Schema) -> Option<(&str, f64)> {
        self.cover_means
            .iter()
            .filter(|(name, _)| {
                schema
                    .column(name)
                    .map(|c| schema.kind(c) == ColumnKind::Species)
                    .unwrap_or(false)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, v)| (name.as_str(), *v))
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        let ffibs = match self.ffibs_mean {
            Some(v) => format!("{:.2}", v),
            None => "-".to_string(),
        };
        let mut line = format!(
            "Y:{:5} | Cells:{:6} | Land:{:.3} | Water:{:.3} | FFIBS:{} | Drift:{}",
            self.year, self.cells, self.land_mean, self.water_mean, ffibs, self.drifted
        );
        if self.reconciled > 0 || self.reconcile_skipped > 0 {
            line.push_str(&format!(" | Morph:{} Skip:{}", self.reconciled, self.reconcile_skipped));
        }
        if self.planted > 0 {
            line.push_str(&format!(" | Planted:{}", self.planted));
        }
        line
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SummaryHistory {
    /// All recorded year summaries
    pub years: Vec<YearSummary>,
}

impl SummaryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a year summary
    pub fn record(&mut self, summary: YearSummary) {
        self.years.push(summary);
    }

    pub fn last(&self) -> Option<&YearSummary> {
        self.years.last()
    }

    pub fn get(&self, year: i32) -> Option<&YearSummary> {
        self.years.iter().find(|s| s.year == year)
    }

    /// Land fraction over time
    pub fn land_series(&self) -> Vec<(i32, f64)> {
        self.years.iter().map(|s| (s.year, s.land_mean)).collect()
    }

    /// Mean cover of one column over time
    pub fn cover_series(&self, column: &str) -> Vec<(i32, f64)> {
        self.years
            .iter()
            .filter_map(|s| {
                s.cover_means
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, v)| (s.year, *v))
            })
            .collect()
    }

    /// Save history to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).map_err(|e| ModelError::Config(e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| ModelError::io(path, e))
    }
}
