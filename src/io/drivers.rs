//! Per-year driver grids.
//!
//! A driver is either a single file holding one grid per year it serves, in
//! year order, or a path template containing `<YEAR>` naming one file per year.

use super::ascii::{read_raster, GridReader};
use super::{expand_year, YEAR_PLACEHOLDER};
use crate::error::{ModelError, Problems, Result};
use crate::grid::{GridHeader, Raster};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Where a driver's yearly grids come from.
#[derive(Clone, Debug, PartialEq)]
pub enum DriverSource {
    Stream(PathBuf),
    PerYear { template: String, year_width: usize },
}

impl DriverSource {
    pub fn parse(spec: &str, year_width: usize) -> Self {
        if spec.contains(YEAR_PLACEHOLDER) {
            Self::PerYear {
                template: spec.to_string(),
                year_width,
            }
        } else {
            Self::Stream(PathBuf::from(spec))
        }
    }
}

/// Sequential reader of one driver's yearly grids.
pub struct DriverStream {
    name: String,
    source: DriverSource,
    reader: Option<GridReader<BufReader<File>>>,
    expected: GridHeader,
}

fn check_header(problems: &mut Problems, name: &str, origin: &Path, header: &GridHeader, expected: &GridHeader) {
    if !header.same_shape(expected) {
        problems.push(format!(
            "driver {} ({}): grid is {}x{}, landscape is {}x{}",
            name,
            origin.display(),
            header.nrows,
            header.ncols,
            expected.nrows,
            expected.ncols
        ));
    }
}

impl DriverStream {
    /// Open a driver and check that it can serve every year in `years`.
    pub fn open(name: &str, source: DriverSource, years: &[i32], expected: &GridHeader) -> Result<Self> {
        let mut problems = Problems::new();

        match &source {
            DriverSource::Stream(path) => {
                let mut reader = GridReader::open(path)?;
                let mut count = 0;
                loop {
                    match reader.next_grid() {
                        Ok(Some(grid)) => {
                            check_header(&mut problems, name, path, &grid.header, expected);
                            count += 1;
                        }
                        Ok(None) => break,
                        Err(e) => {
                            problems.push(format!("driver {}: {}", name, e));
                            break;
                        }
                    }
                }
                if count < years.len() {
                    problems.push(format!(
                        "driver {} ({}): holds {} grid(s), {} year(s) need one each",
                        name,
                        path.display(),
                        count,
                        years.len()
                    ));
                } else if count > years.len() {
                    log::debug!("driver {} holds {} grids, {} will be used", name, count, years.len());
                }
            }
            DriverSource::PerYear { template, year_width } => {
                for &year in years {
                    let path = PathBuf::from(expand_year(template, year, *year_width));
                    match read_raster(&path) {
                        Ok(grid) => check_header(&mut problems, name, &path, &grid.header, expected),
                        Err(e) => problems.push(format!("driver {} year {}: {}", name, year, e)),
                    }
                }
            }
        }

        problems.finish(())?;
        let mut stream = Self {
            name: name.to_string(),
            source,
            reader: None,
            expected: expected.clone(),
        };
        stream.rewind()?;
        Ok(stream)
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader = match &self.source {
            DriverSource::Stream(path) => Some(GridReader::open(path)?),
            DriverSource::PerYear { .. } => None,
        };
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the grid for `year`; stream sources simply yield their next grid.
    pub fn read(&mut self, year: i32) -> Result<Raster> {
        let grid = match (&self.source, self.reader.as_mut()) {
            (DriverSource::Stream(path), Some(reader)) => reader.next_grid()?.ok_or_else(|| {
                ModelError::grid(
                    path.display().to_string(),
                    format!("driver {} has no grid left for year {}", self.name, year),
                )
            })?,
            (DriverSource::PerYear { template, year_width }, _) => {
                read_raster(expand_year(template, year, *year_width))?
            }
            (DriverSource::Stream(path), None) => {
                return Err(ModelError::grid(path.display().to_string(), "driver stream is not open"));
            }
        };
        if !grid.header.same_shape(&self.expected) {
            return Err(ModelError::grid(
                format!("driver {} year {}", self.name, year),
                "grid shape does not match the landscape",
            ));
        }
        Ok(grid)
    }
}
