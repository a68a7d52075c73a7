//! Snapshot sinks.
//!
//! The simulation only asks a sink to write a snapshot; where it goes is up
//! to the sink.

use crate::coverage::{CoverageState, Schema};
use crate::error::{ModelError, Result};
use crate::grid::Landscape;
use crate::io::ascii::{write_raster, write_table};
use crate::io::expand_year;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub trait SnapshotSink {
    fn write_snapshot(&mut self, year: i32, landscape: &Landscape, schema: &Schema, cover: &CoverageState) -> Result<()>;
}

/// Writes the CellID raster followed by the coverage table, one file per year.
#[derive(Clone, Debug)]
pub struct FileSnapshotSink {
    template: String,
    year_width: usize,
    written: Vec<PathBuf>,
}

impl FileSnapshotSink {
    pub fn new(template: impl Into<String>, year_width: usize) -> Self {
        Self {
            template: template.into(),
            year_width,
            written: Vec::new(),
        }
    }

    pub fn path_for(&self, year: i32) -> PathBuf {
        PathBuf::from(expand_year(&self.template, year, self.year_width))
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn write_snapshot(&mut self, year: i32, landscape: &Landscape, schema: &Schema, cover: &CoverageState) -> Result<()> {
        let path = self.path_for(year);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::io(parent, e))?;
        }

        let columns: Vec<&str> = schema.names().collect();
        let rows = landscape.cells().iter().zip(cover.rows()).map(|(c, r)| (c.id, r));

        let write = || -> std::io::Result<()> {
            let mut out = BufWriter::new(File::create(&path)?);
            write_raster(&mut out, &landscape.ids)?;
            write_table(&mut out, &columns, rows)?;
            out.flush()
        };
        write().map_err(|e| ModelError::io(&path, e))?;

        log::debug!("wrote snapshot for {} to {}", year, path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Keeps snapshots in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySnapshotSink {
    pub snapshots: Vec<(i32, CoverageState)>,
}

impl SnapshotSink for MemorySnapshotSink {
    fn write_snapshot(&mut self, year: i32, _: &Landscape, _: &Schema, cover: &CoverageState) -> Result<()> {
        self.snapshots.push((year, cover.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::tests::sav;
    use crate::grid::tests::id_raster;
    use crate::io::read_raster_with_table;
    use crate::species::tests::emergent;
    use tempfile::TempDir;

    #[test]
    fn test_file_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let landscape = Landscape::from_raster(id_raster(2, 2, &[(0, 1)])).unwrap();
        let schema = Schema::new(vec![emergent("A", 0.0, 0.0, 0), sav()]).unwrap();
        let mut cover = CoverageState::zeros(landscape.len(), schema.len());
        cover.set(1, 0, 0.123456);

        let template = format!("{}/out/veg_<YEAR>.asc", dir.path().display());
        let mut sink = FileSnapshotSink::new(template, 4);
        sink.write_snapshot(2025, &landscape, &schema, &cover).unwrap();

        let path = dir.path().join("out/veg_2025.asc");
        assert_eq!(sink.written(), &[path.clone()]);
        let (raster, table) = read_raster_with_table(&path).unwrap();
        assert!(!raster.has_data_at(0, 1));
        let table = table.unwrap();
        assert_eq!(table.columns.len(), schema.len());
        assert_eq!(table.columns[0], "A");
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], (3, {
            let mut row = vec![0.0; schema.len()];
            row[0] = 0.12346;
            row
        }));
    }
}
