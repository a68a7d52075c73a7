//! Environmental drivers sampled at every active cell.

use crate::species::CellDrivers;

/// Yearly driver fields read from raster inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Driver {
    WaveAmplitude,
    MeanSalinity,
    SummerDepth,
    SummerSalinity,
    SummerTemperature,
    HeightAboveWater,
    BarrierIslandHeight,
    BarrierIslandCondition,
    TreeCondition,
    AcuteSalinityStress,
}

impl Driver {
    pub const ALL: [Driver; 10] = [
        Driver::WaveAmplitude,
        Driver::MeanSalinity,
        Driver::SummerDepth,
        Driver::SummerSalinity,
        Driver::SummerTemperature,
        Driver::HeightAboveWater,
        Driver::BarrierIslandHeight,
        Driver::BarrierIslandCondition,
        Driver::TreeCondition,
        Driver::AcuteSalinityStress,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Driver::WaveAmplitude => "wave_amplitude",
            Driver::MeanSalinity => "mean_salinity",
            Driver::SummerDepth => "summer_depth",
            Driver::SummerSalinity => "summer_salinity",
            Driver::SummerTemperature => "summer_temperature",
            Driver::HeightAboveWater => "height_above_water",
            Driver::BarrierIslandHeight => "barrier_island_height",
            Driver::BarrierIslandCondition => "barrier_island_condition",
            Driver::TreeCondition => "tree_condition",
            Driver::AcuteSalinityStress => "acute_salinity_stress",
        }
    }
}

fn flag(value: f64) -> bool {
    value != 0.0 && !value.is_nan()
}

/// Current driver values, one entry per active cell.
#[derive(Clone, Debug)]
pub struct EnvironmentalDrivers {
    fields: [Vec<f64>; 10],
    /// Land-fraction target in percent; negative means no target.
    land_target: Vec<f64>,
}

impl EnvironmentalDrivers {
    pub fn new(cells: usize) -> Self {
        Self {
            fields: std::array::from_fn(|_| vec![0.0; cells]),
            land_target: vec![-1.0; cells],
        }
    }

    pub fn cells(&self) -> usize {
        self.land_target.len()
    }

    pub fn set(&mut self, driver: Driver, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.cells());
        self.fields[driver as usize] = values;
    }

    pub fn field(&self, driver: Driver) -> &[f64] {
        &self.fields[driver as usize]
    }

    pub fn set_land_target(&mut self, percent: Vec<f64>) {
        debug_assert_eq!(percent.len(), self.cells());
        self.land_target = percent;
    }

    /// Target land fraction of a cell, if it has one.
    pub fn land_target(&self, cell: usize) -> Option<f64> {
        let percent = self.land_target[cell];
        if percent >= 0.0 {
            Some(percent / 100.0)
        } else {
            None
        }
    }

    /// Snapshot of every driver at one cell.
    pub fn cell(&self, cell: usize) -> CellDrivers {
        let f = |d: Driver| self.fields[d as usize][cell];
        CellDrivers {
            wave_amplitude: f(Driver::WaveAmplitude),
            mean_salinity: f(Driver::MeanSalinity),
            summer_depth: f(Driver::SummerDepth),
            summer_salinity: f(Driver::SummerSalinity),
            summer_temperature: f(Driver::SummerTemperature),
            height_above_water: f(Driver::HeightAboveWater),
            barrier_island_height: f(Driver::BarrierIslandHeight),
            barrier_island_condition: flag(f(Driver::BarrierIslandCondition)),
            tree_condition: flag(f(Driver::TreeCondition)),
            acute_salinity_stress: flag(f(Driver::AcuteSalinityStress)),
        }
    }
}
