//! Adaptateurs fichiers: grille CSV et destination des GeoJSON

pub mod csv_grid;
pub mod sink;

pub use csv_grid::{read_grid, write_grid, CsvOptions};
pub use sink::{output_filename, DirectorySink, FileSink, SavedFile};
