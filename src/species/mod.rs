//! Species definitions and their ecological response models.
//!
//! Each species carries a [`SpeciesModel`] that decides how its
//! senescence, growth and spread likelihoods are computed from the
//! conditions of a single cell.

pub mod response;
pub mod table;

pub use response::{Curve1D, OutOfDomain, SavRegression, Surface2D};
pub use table::load_species_table;

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Sentinel written to `FFIBS` when a cell holds no scored species.
pub const FFIBS_UNSCORED: f64 = -9999.0;

/// Salinity habitat class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Habitat {
    Fresh,
    Intermediate,
    Brackish,
    Saline,
    #[serde(rename = "NA")]
    NotApplicable,
}

/// Floating mat thickness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatKind {
    Thin,
    Thick,
}

/// Ecological model of a species, carrying its response tables.
#[derive(Clone, Debug, PartialEq)]
pub enum SpeciesModel {
    BottomlandHardwoodForest { establishment: Curve1D, senescence: Curve1D },
    EmergentWetland { establishment: Surface2D, senescence: Surface2D },
    SwampForest { establishment: Surface2D, senescence: Surface2D },
    Sav(SavRegression),
    BarrierIsland { establishment: Curve1D, senescence: Curve1D },
    FloatingMarsh {
        mat: MatKind,
        establishment: Surface2D,
        senescence: Surface2D,
    },
    /// Bookkeeping column outside the cover sum.
    Null,
    /// Cover column that never grows or dies on its own (bareground, water).
    NullCoverage,
}

impl SpeciesModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BottomlandHardwoodForest { .. } => "bottomland_hardwood_forest",
            Self::EmergentWetland { .. } => "emergent_wetland",
            Self::SwampForest { .. } => "swamp_forest",
            Self::Sav(_) => "sav",
            Self::BarrierIsland { .. } => "barrier_island",
            Self::FloatingMarsh { .. } => "floating_marsh",
            Self::Null => "null",
            Self::NullCoverage => "null_coverage",
        }
    }
}

/// Per-cell driver values seen by the response models.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellDrivers {
    pub wave_amplitude: f64,
    pub mean_salinity: f64,
    pub summer_depth: f64,
    pub summer_salinity: f64,
    pub summer_temperature: f64,
    pub height_above_water: f64,
    pub barrier_island_height: f64,
    pub barrier_island_condition: bool,
    pub tree_condition: bool,
    pub acute_salinity_stress: bool,
}

/// Everything a species model may read while a cell is updated.
#[derive(Clone, Copy, Debug)]
pub struct CellContext<'a> {
    pub cell_id: i64,
    pub drivers: CellDrivers,
    /// Dispersal field of this cell, one value per schema column.
    pub dispersal: &'a [f64],
}

/// One row of the species table.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesDefinition {
    pub code: String,
    pub habitat: Habitat,
    pub dispersal_class: u8,
    pub ffibs_score: Option<f64>,
    pub model: SpeciesModel,
}

fn gate(open: bool) -> f64 {
    if open {
        1.0
    } else {
        0.0
    }
}

impl SpeciesDefinition {
    pub fn new(code: impl Into<String>, habitat: Habitat, dispersal_class: u8, model: SpeciesModel) -> Self {
        Self {
            code: code.into(),
            habitat,
            dispersal_class,
            ffibs_score: None,
            model,
        }
    }

    pub fn with_ffibs(mut self, score: f64) -> Self {
        self.ffibs_score = Some(score);
        self
    }

    /// Bookkeeping column with no ecology.
    pub fn null(code: impl Into<String>) -> Self {
        Self::new(code, Habitat::NotApplicable, 0, SpeciesModel::Null)
    }

    /// Cover column with no ecology.
    pub fn null_coverage(code: impl Into<String>) -> Self {
        Self::new(code, Habitat::NotApplicable, 0, SpeciesModel::NullCoverage)
    }

    pub fn mat(&self) -> Option<MatKind> {
        match self.model {
            SpeciesModel::FloatingMarsh { mat, .. } => Some(mat),
            _ => None,
        }
    }

    fn domain(&self, ctx: &CellContext<'_>, err: OutOfDomain) -> ModelError {
        ModelError::Domain {
            species: self.code.clone(),
            cell: ctx.cell_id.to_string(),
            message: err.to_string(),
        }
    }

    /// Fraction of current cover lost this year.
    pub fn senescence(&self, ctx: &CellContext<'_>) -> Result<f64> {
        let d = &ctx.drivers;
        let value = match &self.model {
            SpeciesModel::BottomlandHardwoodForest { senescence, .. } => {
                if d.barrier_island_condition || d.mean_salinity > 1.0 {
                    return Ok(1.0);
                }
                senescence.eval(d.height_above_water)
            }
            SpeciesModel::EmergentWetland { senescence, .. }
            | SpeciesModel::SwampForest { senescence, .. }
            | SpeciesModel::FloatingMarsh { senescence, .. } => {
                if d.barrier_island_condition {
                    return Ok(1.0);
                }
                senescence.eval(d.wave_amplitude, d.mean_salinity)
            }
            SpeciesModel::BarrierIsland { senescence, .. } => {
                if !d.barrier_island_condition {
                    return Ok(1.0);
                }
                senescence.eval(d.barrier_island_height)
            }
            SpeciesModel::Sav(_) | SpeciesModel::Null | SpeciesModel::NullCoverage => return Ok(0.0),
        };
        value.map_err(|e| self.domain(ctx, e))
    }

    /// Establishment likelihood on unoccupied area, weighted by the dispersal field.
    pub fn growth(&self, ctx: &CellContext<'_>, dispersal: f64) -> Result<f64> {
        let d = &ctx.drivers;
        let value = match &self.model {
            SpeciesModel::BottomlandHardwoodForest { establishment, .. } => {
                if d.barrier_island_condition || d.mean_salinity > 1.0 {
                    return Ok(0.0);
                }
                establishment
                    .eval(d.height_above_water)
                    .map(|p| p * dispersal * gate(d.tree_condition))
            }
            SpeciesModel::EmergentWetland { establishment, .. }
            | SpeciesModel::FloatingMarsh { establishment, .. } => {
                if d.barrier_island_condition {
                    return Ok(0.0);
                }
                establishment
                    .eval(d.wave_amplitude, d.mean_salinity)
                    .map(|p| p * dispersal)
            }
            SpeciesModel::SwampForest { establishment, .. } => {
                if d.barrier_island_condition {
                    return Ok(0.0);
                }
                establishment
                    .eval(d.wave_amplitude, d.mean_salinity)
                    .map(|p| p * dispersal * gate(d.tree_condition))
            }
            SpeciesModel::Sav(regression) => {
                if d.barrier_island_condition {
                    return Ok(0.0);
                }
                return Ok(regression.eval(d.summer_temperature, d.summer_salinity, d.summer_depth));
            }
            SpeciesModel::BarrierIsland { establishment, .. } => {
                if !d.barrier_island_condition {
                    return Ok(0.0);
                }
                establishment.eval(d.barrier_island_height)
            }
            SpeciesModel::Null | SpeciesModel::NullCoverage => return Ok(0.0),
        };
        value.map_err(|e| self.domain(ctx, e))
    }

    /// Colonization likelihood independent of neighbors; only dispersal class 3 spreads.
    pub fn spread(&self, ctx: &CellContext<'_>) -> Result<f64> {
        if self.dispersal_class != 3 {
            return Ok(0.0);
        }
        let d = &ctx.drivers;
        let value = match &self.model {
            SpeciesModel::BottomlandHardwoodForest { establishment, .. } => {
                if d.barrier_island_condition || d.mean_salinity > 1.0 {
                    return Ok(0.0);
                }
                establishment
                    .eval(d.height_above_water)
                    .map(|p| p * gate(d.tree_condition))
            }
            SpeciesModel::EmergentWetland { establishment, .. }
            | SpeciesModel::FloatingMarsh { establishment, .. } => {
                if d.barrier_island_condition {
                    return Ok(0.0);
                }
                establishment.eval(d.wave_amplitude, d.mean_salinity)
            }
            SpeciesModel::SwampForest { establishment, .. } => {
                if d.barrier_island_condition {
                    return Ok(0.0);
                }
                establishment
                    .eval(d.wave_amplitude, d.mean_salinity)
                    .map(|p| p * gate(d.tree_condition))
            }
            _ => return Ok(0.0),
        };
        value.map_err(|e| self.domain(ctx, e))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    pub(crate) fn flat_surface(value: f64) -> Surface2D {
        Surface2D::new(
            vec![0.0, 1.0],
            vec![0.0, 40.0],
            array![[value, value], [value, value]],
        )
        .unwrap()
    }

    pub(crate) fn flat_curve(value: f64) -> Curve1D {
        Curve1D::new(vec![-5.0, 5.0], vec![value, value]).unwrap()
    }

    pub(crate) fn emergent(code: &str, growth: f64, senescence: f64, class: u8) -> SpeciesDefinition {
        SpeciesDefinition::new(
            code,
            Habitat::Fresh,
            class,
            SpeciesModel::EmergentWetland {
                establishment: flat_surface(growth),
                senescence: flat_surface(senescence),
            },
        )
    }

    fn ctx(drivers: CellDrivers) -> CellContext<'static> {
        CellContext {
            cell_id: 42,
            drivers,
            dispersal: &[],
        }
    }

    fn forest() -> SpeciesDefinition {
        SpeciesDefinition::new(
            "QULA3",
            Habitat::Fresh,
            3,
            SpeciesModel::BottomlandHardwoodForest {
                establishment: flat_curve(0.4),
                senescence: flat_curve(0.1),
            },
        )
    }

    #[test]
    fn test_forest_salinity_gate() {
        let sp = forest();
        let salty = ctx(CellDrivers {
            mean_salinity: 1.5,
            tree_condition: true,
            ..Default::default()
        });
        assert_eq!(sp.senescence(&salty).unwrap(), 1.0);
        assert_eq!(sp.growth(&salty, 1.0).unwrap(), 0.0);
        assert_eq!(sp.spread(&salty).unwrap(), 0.0);

        let fresh = ctx(CellDrivers {
            mean_salinity: 0.5,
            tree_condition: true,
            ..Default::default()
        });
        assert!((sp.senescence(&fresh).unwrap() - 0.1).abs() < 1e-12);
        assert!((sp.growth(&fresh, 0.5).unwrap() - 0.2).abs() < 1e-12);
        assert!((sp.spread(&fresh).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_tree_condition_blocks_establishment() {
        let sp = forest();
        let no_trees = ctx(CellDrivers::default());
        assert_eq!(sp.growth(&no_trees, 1.0).unwrap(), 0.0);
        assert_eq!(sp.spread(&no_trees).unwrap(), 0.0);
    }

    #[test]
    fn test_emergent_barrier_island_gate() {
        let sp = emergent("SPPA", 0.6, 0.2, 3);
        let island = ctx(CellDrivers {
            barrier_island_condition: true,
            ..Default::default()
        });
        assert_eq!(sp.senescence(&island).unwrap(), 1.0);
        assert_eq!(sp.growth(&island, 1.0).unwrap(), 0.0);
        assert_eq!(sp.spread(&island).unwrap(), 0.0);

        let marsh = ctx(CellDrivers::default());
        assert!((sp.growth(&marsh, 0.5).unwrap() - 0.3).abs() < 1e-12);
        assert!((sp.spread(&marsh).unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_spread_requires_class_three() {
        let sp = emergent("SPPA", 0.6, 0.2, 2);
        assert_eq!(sp.spread(&ctx(CellDrivers::default())).unwrap(), 0.0);
    }

    #[test]
    fn test_barrier_island_inverted_gate() {
        let sp = SpeciesDefinition::new(
            "UNPA",
            Habitat::Saline,
            0,
            SpeciesModel::BarrierIsland {
                establishment: flat_curve(0.7),
                senescence: flat_curve(0.05),
            },
        );
        let mainland = ctx(CellDrivers::default());
        assert_eq!(sp.senescence(&mainland).unwrap(), 1.0);
        assert_eq!(sp.growth(&mainland, 0.0).unwrap(), 0.0);

        let island = ctx(CellDrivers {
            barrier_island_condition: true,
            ..Default::default()
        });
        assert!((sp.senescence(&island).unwrap() - 0.05).abs() < 1e-12);
        // barrier island growth ignores the dispersal field
        assert!((sp.growth(&island, 0.0).unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(sp.spread(&island).unwrap(), 0.0);
    }

    #[test]
    fn test_sav_uses_summer_drivers() {
        let sp = SpeciesDefinition::new(
            "SAV",
            Habitat::NotApplicable,
            0,
            SpeciesModel::Sav(SavRegression {
                intercept: 0.1,
                temperature: 0.0,
                salinity: 0.0,
                depth: 0.5,
            }),
        );
        let c = ctx(CellDrivers {
            summer_depth: 1.0,
            ..Default::default()
        });
        assert_eq!(sp.senescence(&c).unwrap(), 0.0);
        assert!((sp.growth(&c, 0.0).unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_domain_names_species_and_cell() {
        let sp = emergent("SPPA", 0.6, 0.2, 1);
        let c = ctx(CellDrivers {
            wave_amplitude: 3.0,
            ..Default::default()
        });
        match sp.senescence(&c) {
            Err(ModelError::Domain { species, cell, .. }) => {
                assert_eq!(species, "SPPA");
                assert_eq!(cell, "42");
            }
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    #[test]
    fn test_null_models_are_inert() {
        let c = ctx(CellDrivers::default());
        for sp in [SpeciesDefinition::null("FFIBS"), SpeciesDefinition::null_coverage("WATER")] {
            assert_eq!(sp.senescence(&c).unwrap(), 0.0);
            assert_eq!(sp.growth(&c, 1.0).unwrap(), 0.0);
            assert_eq!(sp.spread(&c).unwrap(), 0.0);
        }
    }
}
