//! Piecewise-linear response tables and the SAV regression.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A lookup fell outside the domain of a table.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{axis} = {value} outside table domain [{lo}, {hi}]")]
pub struct OutOfDomain {
    pub axis: &'static str,
    pub value: f64,
    pub lo: f64,
    pub hi: f64,
}

/// Locate `x` on a strictly increasing axis.
///
/// Returns the lower bracket index and the fractional position inside the
/// bracket. The last knot maps onto the final segment with weight 1.
fn bracket(axis: &'static str, knots: &[f64], x: f64) -> Result<(usize, f64), OutOfDomain> {
    let lo = knots[0];
    let hi = knots[knots.len() - 1];
    // NaN fails `contains` and is reported like any other out-of-range value
    if !(lo..=hi).contains(&x) {
        return Err(OutOfDomain { axis, value: x, lo, hi });
    }
    if x == hi {
        return Ok((knots.len() - 2, 1.0));
    }
    let b = knots.partition_point(|k| *k <= x) - 1;
    let scale = (x - knots[b]) / (knots[b + 1] - knots[b]);
    Ok((b, scale))
}

fn check_axis(name: &str, knots: &[f64]) -> Result<(), String> {
    if knots.len() < 2 {
        return Err(format!("{} axis needs at least 2 knots, got {}", name, knots.len()));
    }
    if knots.iter().any(|k| !k.is_finite()) {
        return Err(format!("{} axis contains a non-finite knot", name));
    }
    if knots.windows(2).any(|w| w[0] >= w[1]) {
        return Err(format!("{} axis must be strictly increasing", name));
    }
    Ok(())
}

/// 1-D piecewise-linear curve, used over height above water.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve1D {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Curve1D {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, String> {
        if x.len() != y.len() {
            return Err(format!(
                "curve has {} x values but {} y values",
                x.len(),
                y.len()
            ));
        }
        check_axis("x", &x)?;
        Ok(Self { x, y })
    }

    pub fn eval(&self, x: f64) -> Result<f64, OutOfDomain> {
        let (b, t) = bracket("height above water", &self.x, x)?;
        Ok(self.y[b] * (1.0 - t) + self.y[b + 1] * t)
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }
}

/// Bilinear surface over (wave amplitude, mean salinity).
///
/// `rates` has one row per salinity knot and one column per wave-amplitude knot.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface2D {
    wave_amplitude: Vec<f64>,
    salinity: Vec<f64>,
    rates: Array2<f64>,
}

impl Surface2D {
    pub fn new(wave_amplitude: Vec<f64>, salinity: Vec<f64>, rates: Array2<f64>) -> Result<Self, String> {
        check_axis("wave_amplitude", &wave_amplitude)?;
        check_axis("salinity", &salinity)?;
        let (rows, cols) = rates.dim();
        if rows != salinity.len() || cols != wave_amplitude.len() {
            return Err(format!(
                "rate matrix is {}x{} but axes need {}x{} (salinity x wave_amplitude)",
                rows,
                cols,
                salinity.len(),
                wave_amplitude.len()
            ));
        }
        Ok(Self {
            wave_amplitude,
            salinity,
            rates,
        })
    }

    /// Build from nested rows as they appear in the species table.
    pub fn from_rows(wave_amplitude: Vec<f64>, salinity: Vec<f64>, rows: &[Vec<f64>]) -> Result<Self, String> {
        let ncols = wave_amplitude.len();
        if let Some((j, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(format!("rate row {} has {} values, expected {}", j, row.len(), ncols));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let rates = Array2::from_shape_vec((rows.len(), ncols), flat).map_err(|e| e.to_string())?;
        Self::new(wave_amplitude, salinity, rates)
    }

    pub fn eval(&self, wave_amplitude: f64, salinity: f64) -> Result<f64, OutOfDomain> {
        let (i, s) = bracket("wave amplitude", &self.wave_amplitude, wave_amplitude)?;
        let (j, t) = bracket("mean salinity", &self.salinity, salinity)?;
        let r = &self.rates;
        let low = r[[j, i]] * (1.0 - s) + r[[j, i + 1]] * s;
        let high = r[[j + 1, i]] * (1.0 - s) + r[[j + 1, i + 1]] * s;
        Ok(low * (1.0 - t) + high * t)
    }
}

/// Linear model of SAV cover on summer temperature, salinity and depth.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavRegression {
    pub intercept: f64,
    pub temperature: f64,
    pub salinity: f64,
    pub depth: f64,
}

impl SavRegression {
    /// Predicted cover clamped to [0, 1].
    pub fn eval(&self, temperature: f64, salinity: f64, depth: f64) -> f64 {
        let raw = self.intercept + self.temperature * temperature + self.salinity * salinity + self.depth * depth;
        raw.clamp(0.0, 1.0)
    }
}
