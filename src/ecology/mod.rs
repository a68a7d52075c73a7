//! The yearly engines.
//!
//! This module contains:
//! - Dispersal (neighbor-averaged cover fields)
//! - Patch ecology (per-cell senescence, establishment and derived metrics)
//! - Morphology (land/water correction toward an external target)
//! - Plantings (exogenous per-cell overrides)

pub mod dispersal;
pub mod morphology;
pub mod patch;
pub mod planting;

pub use dispersal::{DispersalEngine, DispersalField};
pub use morphology::{MorphologyReconciler, MorphologyReport, Reconciliation};
pub use patch::{CellUpdate, EcologyReport, PatchEcologyEngine};
pub use planting::{Planting, PlantingInjector, PlantingReport, PlantingSchedule};
