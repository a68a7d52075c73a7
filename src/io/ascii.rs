//! ASCII raster reader and writer with the optional per-cell attribute table.
//!
//! ```text
//! nrows        2
//! ncols        3
//! xllcorner    404000
//! yllcorner    3199000
//! cellsize     480
//! nodata_value -9999
//! 1 2 3
//! 4 -9999 5
//! CELLID,SPPA,WATER
//! 1,0.25000,0.75000
//! ```

use crate::error::{ModelError, Result};
use crate::grid::{GridHeader, Raster};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

const HEADER_KEYS: [&str; 6] = ["nrows", "ncols", "xllcorner", "yllcorner", "cellsize", "nodata_value"];

/// Reads consecutive grids from a line-oriented source.
///
/// Blank lines and lines starting with `#` are skipped everywhere.
pub struct GridReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    source: String,
}

impl GridReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ModelError::io(path, e))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> GridReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            source: source.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::grid(format!("{} line {}", self.source, self.line_no), message)
    }

    /// Next meaningful line, trimmed.
    fn next_line(&mut self) -> Result<Option<String>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.map_err(|e| ModelError::io(&self.source, e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
        Ok(None)
    }

    fn parse_number(&self, token: &str) -> Result<f64> {
        token
            .parse::<f64>()
            .map_err(|_| self.error(format!("cannot parse '{}' as a number", token)))
    }

    fn read_header(&mut self, first: String) -> Result<GridHeader> {
        let mut values: [Option<f64>; 6] = [None; 6];
        let mut line = Some(first);

        for _ in 0..HEADER_KEYS.len() {
            let text = match line.take() {
                Some(text) => text,
                None => self
                    .next_line()?
                    .ok_or_else(|| self.error("unexpected end of file in header"))?,
            };
            let mut parts = text.split_whitespace();
            let key = parts.next().unwrap_or_default().to_ascii_lowercase();
            let value = parts
                .next()
                .ok_or_else(|| self.error(format!("header key '{}' has no value", key)))?;
            let slot = HEADER_KEYS
                .iter()
                .position(|k| *k == key)
                .ok_or_else(|| self.error(format!("unknown header key '{}'", key)))?;
            if values[slot].is_some() {
                return Err(self.error(format!("repeated header key '{}'", key)));
            }
            values[slot] = Some(self.parse_number(value)?);
        }

        // six distinct known keys were read, so every slot is filled
        let [nrows, ncols, xllcorner, yllcorner, cellsize, nodata_value] = values.map(|v| v.unwrap_or_default());
        if nrows < 1.0 || ncols < 1.0 || nrows.fract() != 0.0 || ncols.fract() != 0.0 {
            return Err(self.error(format!("invalid grid size {} x {}", nrows, ncols)));
        }
        Ok(GridHeader {
            nrows: nrows as usize,
            ncols: ncols as usize,
            xllcorner,
            yllcorner,
            cellsize,
            nodata_value,
        })
    }

    fn read_matrix(&mut self, header: &GridHeader) -> Result<Array2<f64>> {
        let mut data = Vec::with_capacity(header.nrows * header.ncols);
        for row in 0..header.nrows {
            let line = self
                .next_line()?
                .ok_or_else(|| self.error(format!("expected {} rows, found {}", header.nrows, row)))?;
            let before = data.len();
            for token in line.split_whitespace() {
                data.push(self.parse_number(token)?);
            }
            let found = data.len() - before;
            if found != header.ncols {
                return Err(self.error(format!("row {} has {} values, expected {}", row, found, header.ncols)));
            }
        }
        Array2::from_shape_vec((header.nrows, header.ncols), data).map_err(|e| self.error(e.to_string()))
    }

    /// Read the next grid, or `None` at end of input.
    pub fn next_grid(&mut self) -> Result<Option<Raster>> {
        let first = match self.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let header = self.read_header(first)?;
        let data = self.read_matrix(&header)?;
        Ok(Some(Raster::new(header, data)))
    }

    /// Read the attribute table following a grid, if present.
    pub fn read_table(&mut self) -> Result<Option<AttributeTable>> {
        let header_line = match self.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let mut fields = header_line.split(',').map(str::trim);
        if !fields.next().is_some_and(|f| f.eq_ignore_ascii_case("CELLID")) {
            return Err(self.error("expected attribute table header starting with CELLID"));
        }
        let columns: Vec<String> = fields.map(str::to_string).collect();

        let mut rows = Vec::new();
        while let Some(line) = self.next_line()? {
            let mut fields = line.split(',').map(str::trim);
            let id = fields.next().unwrap_or_default();
            let id = self.parse_number(id)?;
            if id.fract() != 0.0 {
                return Err(self.error(format!("non-integer cell id {}", id)));
            }
            let values = fields.map(|f| self.parse_number(f)).collect::<Result<Vec<f64>>>()?;
            if values.len() != columns.len() {
                return Err(self.error(format!(
                    "table row has {} values, header names {}",
                    values.len(),
                    columns.len()
                )));
            }
            rows.push((id as i64, values));
        }
        Ok(Some(AttributeTable { columns, rows }))
    }
}

/// Per-cell attribute table keyed by CELLID.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeTable {
    pub columns: Vec<String>,
    pub rows: Vec<(i64, Vec<f64>)>,
}

/// Read a single raster.
pub fn read_raster<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let mut reader = GridReader::open(&path)?;
    reader
        .next_grid()?
        .ok_or_else(|| ModelError::grid(path.as_ref().display().to_string(), "file holds no grid"))
}

/// Read a raster followed by its attribute table.
pub fn read_raster_with_table<P: AsRef<Path>>(path: P) -> Result<(Raster, Option<AttributeTable>)> {
    let mut reader = GridReader::open(&path)?;
    let raster = reader
        .next_grid()?
        .ok_or_else(|| ModelError::grid(path.as_ref().display().to_string(), "file holds no grid"))?;
    let table = reader.read_table()?;
    Ok((raster, table))
}

pub fn write_header<W: Write>(out: &mut W, header: &GridHeader) -> std::io::Result<()> {
    writeln!(out, "nrows        {}", header.nrows)?;
    writeln!(out, "ncols        {}", header.ncols)?;
    writeln!(out, "xllcorner    {}", header.xllcorner)?;
    writeln!(out, "yllcorner    {}", header.yllcorner)?;
    writeln!(out, "cellsize     {}", header.cellsize)?;
    writeln!(out, "nodata_value {}", header.nodata_value)?;
    Ok(())
}

pub fn write_raster<W: Write>(out: &mut W, raster: &Raster) -> std::io::Result<()> {
    write_header(out, &raster.header)?;
    for row in raster.data.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

/// Write the attribute table; values use five decimals.
pub fn write_table<'a, W, I>(out: &mut W, columns: &[&str], rows: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = (i64, &'a [f64])>,
{
    writeln!(out, "CELLID,{}", columns.join(","))?;
    for (id, values) in rows {
        write!(out, "{}", id)?;
        for v in values {
            write!(out, ",{:.5}", v)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GRID: &str = "# landscape\nNROWS 2\nncols 3\nxllcorner 10.5\nyllcorner 20\n\ncellsize 480\nNODATA_value -9999\n1 2 3\n4 -9999 5\nCELLID,A,B\n1,0.25,0.75\n5,1,0\n";

    fn reader(text: &str) -> GridReader<Cursor<Vec<u8>>> {
        GridReader::new(Cursor::new(text.as_bytes().to_vec()), "test")
    }

    #[test]
    fn test_read_grid_and_table() {
        let mut r = reader(GRID);
        let raster = r.next_grid().unwrap().unwrap();
        assert_eq!(raster.header.nrows, 2);
        assert_eq!(raster.header.ncols, 3);
        assert_eq!(raster.header.xllcorner, 10.5);
        assert_eq!(raster.data[[1, 2]], 5.0);
        assert!(!raster.has_data_at(1, 1));

        let table = r.read_table().unwrap().unwrap();
        assert_eq!(table.columns, vec!["A", "B"]);
        assert_eq!(table.rows[1], (5, vec![1.0, 0.0]));
    }

    #[test]
    fn test_header_keys_any_order() {
        let text = "cellsize 30\nnodata_value -1\nncols 1\nnrows 1\nyllcorner 0\nxllcorner 0\n7\n";
        let raster = reader(text).next_grid().unwrap().unwrap();
        assert_eq!(raster.header.cellsize, 30.0);
        assert_eq!(raster.data[[0, 0]], 7.0);
    }

    #[test]
    fn test_header_errors() {
        let repeated = "nrows 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\nnodata_value 0\n1\n";
        let err = reader(repeated).next_grid().unwrap_err();
        assert!(err.to_string().contains("repeated header key 'nrows'"));

        let unknown = "nrows 1\nncols 1\nxllcenter 0\nyllcorner 0\ncellsize 1\nnodata_value 0\n1\n";
        let err = reader(unknown).next_grid().unwrap_err();
        assert!(err.to_string().contains("unknown header key 'xllcenter'"));
        assert!(err.to_string().contains("test line 3"));
    }

    #[test]
    fn test_short_row_rejected() {
        let text = "nrows 2\nncols 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nnodata_value 0\n1 2\n3\n";
        let err = reader(text).next_grid().unwrap_err();
        assert!(err.to_string().contains("row 1 has 1 values"));
    }

    #[test]
    fn test_concatenated_grids() {
        let one = "nrows 1\nncols 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nnodata_value 0\n";
        let text = format!("{}1 2\n{}3 4\n", one, one);
        let mut r = reader(&text);
        assert_eq!(r.next_grid().unwrap().unwrap().data[[0, 1]], 2.0);
        assert_eq!(r.next_grid().unwrap().unwrap().data[[0, 0]], 3.0);
        assert!(r.next_grid().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_back() {
        let mut r = reader(GRID);
        let raster = r.next_grid().unwrap().unwrap();
        let a = [0.125, 0.875];
        let b = [1.0, 0.0];

        let mut out = Vec::new();
        write_raster(&mut out, &raster).unwrap();
        write_table(&mut out, &["A", "B"], vec![(1, &a[..]), (5, &b[..])]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("4 -9999 5"));
        assert!(text.contains("1,0.12500,0.87500"));

        let mut back = reader(&text);
        assert_eq!(back.next_grid().unwrap().unwrap(), raster);
        let table = back.read_table().unwrap().unwrap();
        assert_eq!(table.rows[0], (1, vec![0.125, 0.875]));
    }
}
