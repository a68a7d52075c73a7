//! Planting record parser.
//!
//! One record per line: `year row col fraction (species cover)*`, with
//! zero-based raster row and column. Blank lines and `#` comments are ignored.

use crate::error::{ModelError, Problems, Result};
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub struct PlantingRecord {
    pub year: i32,
    pub row: usize,
    pub col: usize,
    /// Fraction of the cell's land to plant.
    pub fraction: f64,
    /// Species code and share of the planted area.
    pub species: Vec<(String, f64)>,
}

fn parse_line(line: &str) -> std::result::Result<PlantingRecord, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(format!("expected at least 4 fields, found {}", tokens.len()));
    }
    let number = |token: &str| token.parse::<f64>().map_err(|_| format!("cannot parse '{}' as a number", token));
    let index = |token: &str| -> std::result::Result<usize, String> {
        let value = number(token)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(format!("'{}' is not a grid index", token));
        }
        Ok(value as usize)
    };

    let year = number(tokens[0])?;
    if year.fract() != 0.0 {
        return Err(format!("'{}' is not a year", tokens[0]));
    }
    let row = index(tokens[1])?;
    let col = index(tokens[2])?;
    let fraction = number(tokens[3])?;
    if !(0.0..=1.0).contains(&fraction) {
        return Err(format!("fraction {} outside [0, 1]", fraction));
    }

    let pairs = &tokens[4..];
    if pairs.len() % 2 != 0 {
        return Err("species and cover values must come in pairs".to_string());
    }
    let mut species = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks(2) {
        species.push((pair[0].to_string(), number(pair[1])?));
    }

    Ok(PlantingRecord {
        year: year as i32,
        row,
        col,
        fraction,
        species,
    })
}

/// Parse planting records, reporting every malformed line at once.
pub fn parse_plantings(text: &str, source: &str) -> Result<Vec<PlantingRecord>> {
    let mut problems = Problems::new();
    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(e) => problems.push(format!("{} line {}: {}", source, n + 1, e)),
        }
    }
    problems.finish(records)
}

pub fn read_plantings<P: AsRef<Path>>(path: P) -> Result<Vec<PlantingRecord>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
    parse_plantings(&text, &path.display().to_string())
}
