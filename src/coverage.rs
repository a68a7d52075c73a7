//! Fixed column schema and per-cell coverage fractions.

use crate::error::{Problems, Result};
use crate::species::{Habitat, MatKind, SpeciesDefinition, SpeciesModel};
use std::collections::HashMap;

pub const BAREGRND_NEW: &str = "BAREGRND_NEW";
pub const BAREGRND_OLD: &str = "BAREGRND_OLD";
pub const BAREGRND_FLT: &str = "BAREGRND_Flt";
pub const DEAD_FLT: &str = "DEAD_Flt";
pub const FFIBS: &str = "FFIBS";
pub const WATER: &str = "WATER";
pub const NOTMOD: &str = "NOTMOD";
pub const SAV: &str = "SAV";

/// Land-by-community diagnostics, in [`LandShare`] order.
pub const LAND_SHARE_COLUMNS: [&str; 6] = ["pL_BF", "pL_SF", "pL_FM", "pL_IM", "pL_BM", "pL_SM"];

/// Synthetic cover columns appended when the species table omits them.
const SYNTHETIC_COVERAGE: [&str; 5] = [BAREGRND_NEW, BAREGRND_OLD, BAREGRND_FLT, WATER, NOTMOD];

/// Tolerance of the per-cell cover sum after an update.
pub const COVER_TOLERANCE: f64 = 0.005;

/// Role of a column in the cover sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Modeled vegetation (or SAV).
    Species,
    /// Counted in the cover sum but never grows on its own.
    Coverage,
    /// Derived value, never counted.
    Diagnostic,
}

/// Habitat communities reported as a share of vegetated land.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandShare {
    BottomlandForest = 0,
    SwampForest = 1,
    FreshMarsh = 2,
    IntermediateMarsh = 3,
    BrackishMarsh = 4,
    SalineMarsh = 5,
}

fn land_share(def: &SpeciesDefinition) -> Option<LandShare> {
    match (&def.model, def.habitat) {
        (SpeciesModel::BottomlandHardwoodForest { .. }, _) => Some(LandShare::BottomlandForest),
        (SpeciesModel::SwampForest { .. }, _) => Some(LandShare::SwampForest),
        (SpeciesModel::EmergentWetland { .. }, Habitat::Fresh) => Some(LandShare::FreshMarsh),
        (SpeciesModel::EmergentWetland { .. }, Habitat::Intermediate) => Some(LandShare::IntermediateMarsh),
        (SpeciesModel::EmergentWetland { .. }, Habitat::Brackish) => Some(LandShare::BrackishMarsh),
        (SpeciesModel::EmergentWetland { .. }, Habitat::Saline) => Some(LandShare::SalineMarsh),
        // barrier island vegetation is reported with saline marsh
        (SpeciesModel::BarrierIsland { .. }, _) => Some(LandShare::SalineMarsh),
        _ => None,
    }
}

/// Indices of the columns the engines address by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecialColumns {
    pub bare_new: usize,
    pub bare_old: usize,
    pub bare_flt: usize,
    pub dead_flt: usize,
    pub ffibs: usize,
    pub water: usize,
    pub notmod: usize,
    pub sav: usize,
    pub land_share: [usize; 6],
}

/// Column groups precomputed once so the per-cell passes only walk indices.
#[derive(Clone, Debug, Default)]
pub struct ColumnGroups {
    /// Rooted vegetation: senesces, grows and colonizes bareground.
    pub terrestrial: Vec<usize>,
    pub floating: Vec<(usize, MatKind)>,
    /// Fresh emergent marsh lost under acute salinity stress.
    pub fresh_emergent: Vec<usize>,
    pub barrier_island: Vec<usize>,
    /// Columns with an FFIBS score.
    pub scored: Vec<usize>,
    /// Columns counted in the cover sum.
    pub counted: Vec<usize>,
    /// Counted columns that are land (not SAV, water or unmodeled).
    pub land: Vec<usize>,
    /// Land vegetation scaled down when the landscape loses land.
    pub erodible: Vec<usize>,
    /// Columns squeezed to make room for a planting.
    pub plantable: Vec<usize>,
    pub land_share: [Vec<usize>; 6],
}

/// The fixed set of columns carried by every cell.
#[derive(Clone, Debug)]
pub struct Schema {
    columns: Vec<SpeciesDefinition>,
    kinds: Vec<ColumnKind>,
    index: HashMap<String, usize>,
    pub special: SpecialColumns,
    pub groups: ColumnGroups,
}

fn kind_of(def: &SpeciesDefinition) -> ColumnKind {
    match def.model {
        SpeciesModel::Null => ColumnKind::Diagnostic,
        SpeciesModel::NullCoverage => ColumnKind::Coverage,
        _ => ColumnKind::Species,
    }
}

impl Schema {
    /// Build the schema from the species table, appending synthetic columns.
    pub fn new(species: Vec<SpeciesDefinition>) -> Result<Self> {
        let mut problems = Problems::new();
        let mut columns = species;

        let present = |columns: &[SpeciesDefinition], name: &str| columns.iter().any(|c| c.code == name);

        for name in SYNTHETIC_COVERAGE {
            if !present(&columns, name) {
                columns.push(SpeciesDefinition::null_coverage(name));
            }
        }
        for name in [DEAD_FLT, FFIBS].into_iter().chain(LAND_SHARE_COLUMNS) {
            if !present(&columns, name) {
                columns.push(SpeciesDefinition::null(name));
            }
        }

        let kinds: Vec<ColumnKind> = columns.iter().map(kind_of).collect();
        let index: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.code.clone(), i))
            .collect();

        for name in SYNTHETIC_COVERAGE {
            if kinds[index[name]] != ColumnKind::Coverage {
                problems.push(format!("{} must be declared as null_coverage", name));
            }
        }
        for name in [DEAD_FLT, FFIBS].into_iter().chain(LAND_SHARE_COLUMNS) {
            if kinds[index[name]] != ColumnKind::Diagnostic {
                problems.push(format!("{} must be declared as null", name));
            }
        }
        let sav = match index.get(SAV) {
            Some(&i) if matches!(columns[i].model, SpeciesModel::Sav(_)) => i,
            _ => {
                problems.push("species table must define SAV with the sav variant");
                0
            }
        };

        let special = SpecialColumns {
            bare_new: index[BAREGRND_NEW],
            bare_old: index[BAREGRND_OLD],
            bare_flt: index[BAREGRND_FLT],
            dead_flt: index[DEAD_FLT],
            ffibs: index[FFIBS],
            water: index[WATER],
            notmod: index[NOTMOD],
            sav,
            land_share: LAND_SHARE_COLUMNS.map(|name| index[name]),
        };
        let groups = Self::groups(&columns, &kinds, &special);

        problems.finish(Self {
            columns,
            kinds,
            index,
            special,
            groups,
        })
    }

    fn groups(columns: &[SpeciesDefinition], kinds: &[ColumnKind], special: &SpecialColumns) -> ColumnGroups {
        let mut g = ColumnGroups::default();
        for (i, def) in columns.iter().enumerate() {
            let kind = kinds[i];
            let is_sav = i == special.sav;
            if kind == ColumnKind::Species && !is_sav {
                match def.mat() {
                    Some(mat) => g.floating.push((i, mat)),
                    None => {
                        g.terrestrial.push(i);
                        g.erodible.push(i);
                    }
                }
            }
            if matches!(def.model, SpeciesModel::EmergentWetland { .. }) && def.habitat == Habitat::Fresh {
                g.fresh_emergent.push(i);
            }
            if matches!(def.model, SpeciesModel::BarrierIsland { .. }) {
                g.barrier_island.push(i);
            }
            if def.ffibs_score.is_some() {
                g.scored.push(i);
            }
            if kind != ColumnKind::Diagnostic {
                g.counted.push(i);
                if !is_sav && i != special.water && i != special.notmod {
                    g.land.push(i);
                }
                if !is_sav && i != special.water {
                    g.plantable.push(i);
                }
            }
            if let Some(share) = land_share(def) {
                g.land_share[share as usize].push(i);
            }
        }
        g
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, column: usize) -> &str {
        &self.columns[column].code
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.code.as_str())
    }

    pub fn kind(&self, column: usize) -> ColumnKind {
        self.kinds[column]
    }

    pub fn definition(&self, column: usize) -> &SpeciesDefinition {
        &self.columns[column]
    }

    pub fn definitions(&self) -> &[SpeciesDefinition] {
        &self.columns
    }

    /// Sum of the counted (non-diagnostic) columns of one cell.
    pub fn cover_sum(&self, row: &[f64]) -> f64 {
        self.groups.counted.iter().map(|&i| row[i]).sum()
    }

    /// Sum of the land columns of one cell.
    pub fn land_sum(&self, row: &[f64]) -> f64 {
        self.groups.land.iter().map(|&i| row[i]).sum()
    }
}

/// Coverage fractions of every active cell, one row per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageState {
    ncols: usize,
    values: Vec<f64>,
}

impl CoverageState {
    pub fn zeros(cells: usize, ncols: usize) -> Self {
        Self {
            ncols,
            values: vec![0.0; cells * ncols],
        }
    }

    pub fn cells(&self) -> usize {
        if self.ncols == 0 {
            0
        } else {
            self.values.len() / self.ncols
        }
    }

    pub fn columns(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn row(&self, cell: usize) -> &[f64] {
        &self.values[cell * self.ncols..(cell + 1) * self.ncols]
    }

    #[inline]
    pub fn row_mut(&mut self, cell: usize) -> &mut [f64] {
        &mut self.values[cell * self.ncols..(cell + 1) * self.ncols]
    }

    #[inline]
    pub fn get(&self, cell: usize, column: usize) -> f64 {
        self.values[cell * self.ncols + column]
    }

    #[inline]
    pub fn set(&mut self, cell: usize, column: usize, value: f64) {
        self.values[cell * self.ncols + column] = value;
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, f64> {
        self.values.chunks(self.ncols.max(1))
    }

    /// Flat row-major storage, for parallel passes.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Mean of one column over all cells.
    pub fn column_mean(&self, column: usize) -> f64 {
        let cells = self.cells();
        if cells == 0 {
            return 0.0;
        }
        self.rows().map(|r| r[column]).sum::<f64>() / cells as f64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::species::tests::{emergent, flat_surface};
    use crate::species::SavRegression;

    pub(crate) fn sav() -> SpeciesDefinition {
        SpeciesDefinition::new(
            SAV,
            Habitat::NotApplicable,
            0,
            SpeciesModel::Sav(SavRegression {
                intercept: 0.0,
                temperature: 0.0,
                salinity: 0.0,
                depth: 0.0,
            }),
        )
    }

    pub(crate) fn floating(code: &str, mat: MatKind, growth: f64, senescence: f64) -> SpeciesDefinition {
        SpeciesDefinition::new(
            code,
            Habitat::Fresh,
            0,
            SpeciesModel::FloatingMarsh {
                mat,
                establishment: flat_surface(growth),
                senescence: flat_surface(senescence),
            },
        )
    }

    #[test]
    fn test_synthetic_columns_appended() {
        let schema = Schema::new(vec![emergent("A", 0.5, 0.0, 0), sav()]).unwrap();
        assert_eq!(schema.column("A"), Some(0));
        assert_eq!(schema.special.sav, 1);
        for name in [BAREGRND_NEW, BAREGRND_OLD, BAREGRND_FLT, WATER, NOTMOD] {
            let i = schema.column(name).unwrap();
            assert_eq!(schema.kind(i), ColumnKind::Coverage);
        }
        for name in [DEAD_FLT, FFIBS, "pL_SM"] {
            let i = schema.column(name).unwrap();
            assert_eq!(schema.kind(i), ColumnKind::Diagnostic);
        }
        assert_eq!(schema.len(), 2 + 5 + 2 + 6);
    }

    #[test]
    fn test_groups() {
        let schema = Schema::new(vec![
            emergent("A", 0.5, 0.0, 0),
            floating("THIN", MatKind::Thin, 0.1, 0.1),
            sav(),
        ])
        .unwrap();
        let g = &schema.groups;
        assert_eq!(g.terrestrial, vec![0]);
        assert_eq!(g.floating, vec![(1, MatKind::Thin)]);
        assert_eq!(g.fresh_emergent, vec![0]);
        assert!(!g.land.contains(&schema.special.sav));
        assert!(!g.land.contains(&schema.special.water));
        assert!(!g.land.contains(&schema.special.notmod));
        assert!(g.land.contains(&1));
        assert!(g.land.contains(&schema.special.bare_old));
        assert!(!g.erodible.contains(&1));
        assert!(g.plantable.contains(&schema.special.notmod));
        assert!(!g.counted.contains(&schema.special.ffibs));
    }

    #[test]
    fn test_declared_synthetic_with_wrong_variant() {
        let err = Schema::new(vec![emergent("WATER", 0.5, 0.0, 0), sav()]).unwrap_err();
        assert!(err.problems()[0].contains("WATER must be declared as null_coverage"));
    }

    #[test]
    fn test_missing_sav_reported() {
        let err = Schema::new(vec![emergent("A", 0.5, 0.0, 0)]).unwrap_err();
        assert!(err.to_string().contains("SAV"));
    }

    #[test]
    fn test_coverage_rows() {
        let mut state = CoverageState::zeros(3, 4);
        state.set(1, 2, 0.5);
        assert_eq!(state.cells(), 3);
        assert_eq!(state.row(1), &[0.0, 0.0, 0.5, 0.0]);
        state.row_mut(2)[0] = 1.0;
        assert_eq!(state.get(2, 0), 1.0);
        assert!((state.column_mean(2) - 0.5 / 3.0).abs() < 1e-12);
    }
}
