//! YAML species table loader.
//!
//! ```yaml
//! species:
//!   - code: SPPA
//!     variant: emergent_wetland
//!     habitat: Saline
//!     dispersal_class: 3
//!     ffibs_score: 24
//!     establishment: { wave_amplitude: [0, 1], salinity: [0, 40], rates: [[0.1, 0.1], [0.5, 0.2]] }
//!     senescence:    { wave_amplitude: [0, 1], salinity: [0, 40], rates: [[0.0, 0.0], [0.1, 0.3]] }
//!   - code: SAV
//!     variant: sav
//!     coefficients: { intercept: 0.1, temperature: 0.01, salinity: -0.02, depth: -0.3 }
//! ```

use super::{Curve1D, Habitat, MatKind, SavRegression, SpeciesDefinition, SpeciesModel, Surface2D};
use crate::error::{ModelError, Problems, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantTag {
    BottomlandHardwoodForest,
    EmergentWetland,
    SwampForest,
    Sav,
    BarrierIsland,
    FloatingMarsh,
    Null,
    NullCoverage,
}

/// Response table as written in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableSpec {
    Curve {
        x: Vec<f64>,
        y: Vec<f64>,
    },
    Surface {
        wave_amplitude: Vec<f64>,
        salinity: Vec<f64>,
        rates: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub code: String,
    /// Checked in [`SpeciesEntry::build`] so an unknown tag is reported with the rest.
    pub variant: String,
    #[serde(default = "default_habitat")]
    pub habitat: String,
    #[serde(default)]
    pub dispersal_class: u8,
    #[serde(default)]
    pub ffibs_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub establishment: Option<TableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub senescence: Option<TableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<SavRegression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mat: Option<MatKind>,
}

fn default_habitat() -> String {
    "NA".to_string()
}

/// Parse a snake_case or renamed enum tag held as text.
fn tag<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    serde_yaml::from_value(serde_yaml::Value::String(text.to_string())).ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesTable {
    pub species: Vec<SpeciesEntry>,
}

fn curve(code: &str, which: &str, spec: Option<&TableSpec>) -> std::result::Result<Curve1D, String> {
    match spec {
        Some(TableSpec::Curve { x, y }) => {
            Curve1D::new(x.clone(), y.clone()).map_err(|e| format!("{}: {} table: {}", code, which, e))
        }
        Some(TableSpec::Surface { .. }) => Err(format!(
            "{}: {} table must be a 1-D curve (x, y)",
            code, which
        )),
        None => Err(format!("{}: missing {} table", code, which)),
    }
}

fn surface(code: &str, which: &str, spec: Option<&TableSpec>) -> std::result::Result<Surface2D, String> {
    match spec {
        Some(TableSpec::Surface {
            wave_amplitude,
            salinity,
            rates,
        }) => Surface2D::from_rows(wave_amplitude.clone(), salinity.clone(), rates)
            .map_err(|e| format!("{}: {} table: {}", code, which, e)),
        Some(TableSpec::Curve { .. }) => Err(format!(
            "{}: {} table must be a 2-D surface (wave_amplitude, salinity, rates)",
            code, which
        )),
        None => Err(format!("{}: missing {} table", code, which)),
    }
}

fn record<T>(problems: &mut Problems, result: std::result::Result<T, String>) -> Option<T> {
    result.map_err(|e| problems.push(e)).ok()
}

impl SpeciesEntry {
    pub fn variant_tag(&self) -> Option<VariantTag> {
        tag(&self.variant)
    }

    /// Build the definition, recording every problem found.
    fn build(&self, problems: &mut Problems) -> Option<SpeciesDefinition> {
        let code = self.code.as_str();
        let before = problems.len();

        if code.trim().is_empty() {
            problems.push("species entry with empty code");
        }
        let habitat = tag::<Habitat>(&self.habitat);
        if habitat.is_none() {
            problems.push(format!("{}: unknown habitat '{}'", code, self.habitat));
        }
        let variant = match self.variant_tag() {
            Some(variant) => variant,
            None => {
                problems.push(format!("{}: unknown variant '{}'", code, self.variant));
                return None;
            }
        };
        if self.dispersal_class > 3 {
            problems.push(format!(
                "{}: dispersal_class {} outside 0..=3",
                code, self.dispersal_class
            ));
        }
        if let Some(score) = self.ffibs_score {
            if !score.is_finite() {
                problems.push(format!("{}: ffibs_score must be finite", code));
            }
        }

        let est = self.establishment.as_ref();
        let sen = self.senescence.as_ref();
        let model = match variant {
            VariantTag::BottomlandHardwoodForest => {
                let establishment = record(problems, curve(code, "establishment", est));
                let senescence = record(problems, curve(code, "senescence", sen));
                establishment
                    .zip(senescence)
                    .map(|(establishment, senescence)| SpeciesModel::BottomlandHardwoodForest {
                        establishment,
                        senescence,
                    })
            }
            VariantTag::BarrierIsland => {
                let establishment = record(problems, curve(code, "establishment", est));
                let senescence = record(problems, curve(code, "senescence", sen));
                establishment
                    .zip(senescence)
                    .map(|(establishment, senescence)| SpeciesModel::BarrierIsland {
                        establishment,
                        senescence,
                    })
            }
            VariantTag::EmergentWetland | VariantTag::SwampForest | VariantTag::FloatingMarsh => {
                let establishment = record(problems, surface(code, "establishment", est));
                let senescence = record(problems, surface(code, "senescence", sen));
                let mat = match (variant, self.mat) {
                    (VariantTag::FloatingMarsh, None) => {
                        problems.push(format!("{}: floating_marsh requires mat: thin|thick", code));
                        None
                    }
                    (VariantTag::FloatingMarsh, Some(mat)) => Some(mat),
                    (_, _) => None,
                };
                establishment.zip(senescence).map(|(establishment, senescence)| match variant {
                    VariantTag::EmergentWetland => SpeciesModel::EmergentWetland {
                        establishment,
                        senescence,
                    },
                    VariantTag::SwampForest => SpeciesModel::SwampForest {
                        establishment,
                        senescence,
                    },
                    _ => SpeciesModel::FloatingMarsh {
                        mat: mat.unwrap_or(MatKind::Thin),
                        establishment,
                        senescence,
                    },
                })
            }
            VariantTag::Sav => match self.coefficients {
                Some(c) => Some(SpeciesModel::Sav(c)),
                None => {
                    problems.push(format!("{}: sav requires coefficients", code));
                    None
                }
            },
            VariantTag::Null => Some(SpeciesModel::Null),
            VariantTag::NullCoverage => Some(SpeciesModel::NullCoverage),
        };

        if problems.len() > before {
            return None;
        }
        model.zip(habitat).map(|(model, habitat)| SpeciesDefinition {
            code: self.code.clone(),
            habitat,
            dispersal_class: self.dispersal_class,
            ffibs_score: self.ffibs_score,
            model,
        })
    }
}

/// Parse and validate a species table, reporting every problem at once.
pub fn parse_species_table(text: &str) -> Result<Vec<SpeciesDefinition>> {
    let table: SpeciesTable =
        serde_yaml::from_str(text).map_err(|e| ModelError::Setup(vec![format!("species table: {}", e)]))?;

    let mut problems = Problems::new();
    let mut seen = HashSet::new();
    let mut definitions = Vec::with_capacity(table.species.len());

    for entry in &table.species {
        if !seen.insert(entry.code.clone()) {
            problems.push(format!("duplicate species code {}", entry.code));
            continue;
        }
        if entry.variant_tag() == Some(VariantTag::Sav) && entry.code != "SAV" {
            problems.push(format!("sav species must use code SAV, found {}", entry.code));
        }
        if let Some(def) = entry.build(&mut problems) {
            definitions.push(def);
        }
    }

    let sav_count = table
        .species
        .iter()
        .filter(|e| e.variant_tag() == Some(VariantTag::Sav))
        .count();
    if sav_count != 1 {
        problems.push(format!("expected exactly one sav species, found {}", sav_count));
    }

    problems.finish(definitions)
}

/// Load a species table from a YAML file.
pub fn load_species_table<P: AsRef<Path>>(path: P) -> Result<Vec<SpeciesDefinition>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    parse_species_table(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
species:
  - code: QULA3
    variant: bottomland_hardwood_forest
    habitat: Fresh
    dispersal_class: 1
    ffibs_score: 0
    establishment: { x: [-1.0, 1.0], y: [0.1, 0.9] }
    senescence: { x: [-1.0, 1.0], y: [0.2, 0.0] }
  - code: ELBA2_Flt
    variant: floating_marsh
    habitat: Fresh
    mat: thin
    establishment: { wave_amplitude: [0, 1], salinity: [0, 40], rates: [[0.5, 0.5], [0.0, 0.0]] }
    senescence: { wave_amplitude: [0, 1], salinity: [0, 40], rates: [[0.1, 0.1], [1.0, 1.0]] }
  - code: SAV
    variant: sav
    coefficients: { intercept: 0.1, temperature: 0.0, salinity: 0.0, depth: 0.0 }
  - code: WATER
    variant: null_coverage
"#;

    #[test]
    fn test_parse_valid_table() {
        let defs = parse_species_table(TABLE).unwrap();
        assert_eq!(defs.len(), 4);
        assert_eq!(defs[0].code, "QULA3");
        assert_eq!(defs[0].ffibs_score, Some(0.0));
        assert_eq!(defs[1].mat(), Some(MatKind::Thin));
        assert_eq!(defs[3].model, SpeciesModel::NullCoverage);
        assert_eq!(defs[3].habitat, Habitat::NotApplicable);
    }

    #[test]
    fn test_problems_are_aggregated() {
        let text = r#"
species:
  - code: A
    variant: emergent_wetland
    dispersal_class: 7
    establishment: { x: [0, 1], y: [0, 1] }
  - code: A
    variant: null
  - code: F
    variant: floating_marsh
    establishment: { wave_amplitude: [0, 1], salinity: [0, 40], rates: [[0.5, 0.5]] }
    senescence: { wave_amplitude: [0, 1], salinity: [0, 40], rates: [[0.1, 0.1], [1.0, 1.0]] }
"#;
        let problems = parse_species_table(text).unwrap_err().problems();
        let joined = problems.join("\n");
        assert!(joined.contains("dispersal_class 7"), "{}", joined);
        assert!(joined.contains("A: establishment table must be a 2-D surface"), "{}", joined);
        assert!(joined.contains("A: missing senescence table"), "{}", joined);
        assert!(joined.contains("duplicate species code A"), "{}", joined);
        assert!(joined.contains("F: establishment table"), "{}", joined);
        assert!(joined.contains("F: floating_marsh requires mat"), "{}", joined);
        assert!(joined.contains("exactly one sav species, found 0"), "{}", joined);
    }

    #[test]
    fn test_unknown_tags_reported_together() {
        let text = r#"
species:
  - code: SPPA
    variant: emergent_wetlnd
    habitat: Saline
  - code: RHMA
    variant: mangrove
    habitat: Tidal
  - code: QULA3
    variant: bottomland_hardwood_forest
    habitat: Fresh
    dispersal_class: 9
    establishment: { x: [-1.0, 1.0], y: [0.1, 0.9] }
    senescence: { x: [-1.0, 1.0], y: [0.2, 0.0] }
  - code: SAV
    variant: sav
    coefficients: { intercept: 0.1, temperature: 0.0, salinity: 0.0, depth: 0.0 }
"#;
        let problems = parse_species_table(text).unwrap_err().problems();
        assert_eq!(problems.len(), 4, "{:?}", problems);
        assert!(problems.contains(&"SPPA: unknown variant 'emergent_wetlnd'".to_string()));
        assert!(problems.contains(&"RHMA: unknown habitat 'Tidal'".to_string()));
        assert!(problems.contains(&"RHMA: unknown variant 'mangrove'".to_string()));
        assert!(problems.iter().any(|p| p.contains("QULA3: dispersal_class 9")));
    }

    #[test]
    fn test_sav_code_enforced() {
        let text = r#"
species:
  - code: SAV_X
    variant: sav
    coefficients: { intercept: 0.1, temperature: 0.0, salinity: 0.0, depth: 0.0 }
"#;
        let problems = parse_species_table(text).unwrap_err().problems();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("must use code SAV"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_species_table("/nonexistent/species.yaml").unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
