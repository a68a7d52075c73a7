//! # coastveg
//!
//! Annual plant-community succession model for coastal wetland raster landscapes.
//!
//! ## Features
//!
//! - **Species models**: forest, emergent marsh, swamp, SAV, barrier island and floating marsh
//! - **Parallel**: per-cell passes run on all CPU cores via Rayon
//! - **Deterministic**: a priority-ordered event schedule replays identically
//! - **Configurable**: YAML configuration and species tables
//! - **Morphology and plantings**: external land/water targets and planting records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coastveg::{Config, Simulation};
//!
//! let config = Config::from_file("config.yaml").unwrap();
//! let mut sim = Simulation::from_config(&config).unwrap();
//!
//! // One year at a time
//! while let Some(year) = sim.step().unwrap() {
//!     println!("{}", sim.history.last().unwrap().summary());
//!     println!("finished {}", year);
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use coastveg::config::{Config, YearSpec};
//!
//! let mut config = Config::default();
//! config.simulation.start_year = 2018;
//! config.simulation.end_year = 2030;
//! config.output.years = vec![YearSpec::Range("2018:2030".to_string())];
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Single cell update
//!
//! ```rust
//! use coastveg::coverage::Schema;
//! use coastveg::ecology::patch::update_cell;
//! use coastveg::species::{CellContext, CellDrivers};
//! use coastveg::species::table::parse_species_table;
//!
//! let species = parse_species_table(r#"
//! species:
//!   - code: SAV
//!     variant: sav
//!     habitat: NA
//!     dispersal_class: 0
//!     coefficients: { intercept: 0.5, temperature: 0.0, salinity: 0.0, depth: 0.0 }
//! "#).unwrap();
//! let schema = Schema::new(species).unwrap();
//!
//! let mut row = vec![0.0; schema.len()];
//! row[schema.special.water] = 1.0;
//! let dispersal = vec![0.0; schema.len()];
//! let ctx = CellContext { cell_id: 1, drivers: CellDrivers::default(), dispersal: &dispersal };
//! update_cell(&schema, &mut row, &ctx, false).unwrap();
//! assert_eq!(row[schema.special.sav], 0.5);
//! ```

pub mod config;
pub mod coverage;
pub mod drivers;
pub mod ecology;
pub mod error;
pub mod event;
pub mod grid;
pub mod io;
pub mod output;
pub mod simulation;
pub mod species;
pub mod stats;

// Re-export main types
pub use config::Config;
pub use coverage::{CoverageState, Schema};
pub use error::{ModelError, Result};
pub use simulation::{Command, Simulation};
pub use species::{SpeciesDefinition, SpeciesModel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
