//! File formats: ASCII rasters, per-year driver streams and planting records.

pub mod ascii;
pub mod drivers;
pub mod plantings;

pub use ascii::{read_raster, read_raster_with_table, AttributeTable, GridReader};
pub use drivers::{DriverSource, DriverStream};
pub use plantings::{parse_plantings, read_plantings, PlantingRecord};

/// Placeholder replaced by the formatted year in path templates.
pub const YEAR_PLACEHOLDER: &str = "<YEAR>";

/// Substitute `year`, zero padded to `width`, into a path template.
pub fn expand_year(template: &str, year: i32, width: usize) -> String {
    template.replace(YEAR_PLACEHOLDER, &format!("{:0width$}", year, width = width))
}
