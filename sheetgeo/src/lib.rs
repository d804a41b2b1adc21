//! # sheetgeo
//!
//! Conversion de données tabulaires (feuilles de calcul) en GeoJSON, et
//! enrichissement des lignes par géocodage d'adresses.
//!
//! ## Features
//!
//! - Normalisation des en-têtes en clés camelCase stables
//! - Construction de FeatureCollection (points) avec ordre de clés stable
//! - Fournisseurs de géocodage interchangeables (Mapbox, Google, MapQuest, Nominatim)
//! - Retry avec attente croissante, écriture incrémentale et idempotente
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sheetgeo::{export_collection, ColumnMapping, Grid, MemoryGrid};
//!
//! let grid = MemoryGrid::from_strings(vec![
//!     vec!["Id", "Longitude", "Latitude"],
//!     vec!["a", "5.72", "45.18"],
//! ]);
//! let mapping = ColumnMapping::new("Id", "Longitude", "Latitude");
//! let outcome = export_collection(&grid, grid.full_range(), 0, &mapping)?;
//! println!("{}", outcome.collection.to_json_pretty()?);
//! ```

pub mod error;
pub mod feature;
pub mod geocode;
pub mod grid;
pub mod header;
pub mod output;
pub mod record;
pub mod types;

pub use error::{GeocodeError, SheetError};
pub use feature::{build, BuildOutcome, ColumnMapping, Feature};
pub use grid::{Grid, MemoryGrid};
pub use header::{file_stem, normalize, normalize_all, HeaderKey};
pub use output::FeatureCollection;
pub use record::{project, read_records, Record};
pub use types::{CellValue, GridRange};

use tracing::info;

/// Résultat d'un export: la collection et le nombre de lignes écartées
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOutcome {
    pub collection: FeatureCollection,

    /// Lignes de données lues
    pub rows: usize,

    /// Lignes sans identifiant ou sans coordonnées valides
    pub skipped: usize,
}

/// Lit une plage de la grille et construit la FeatureCollection.
///
/// # Arguments
///
/// * `grid` - Source tabulaire
/// * `range` - Plage sélectionnée (décalée d'une ligne si elle commence sur l'en-tête)
/// * `header_row` - Ligne contenant les en-têtes
/// * `mapping` - Colonnes id / longitude / latitude
///
/// # Errors
///
/// Retourne `SheetError` si la plage sort de la grille.
pub fn export_collection<G: Grid + ?Sized>(
    grid: &G,
    range: GridRange,
    header_row: usize,
    mapping: &ColumnMapping,
) -> Result<ExportOutcome, SheetError> {
    let records = read_records(grid, range, header_row)?;
    let outcome = build(&records, mapping);

    info!(
        rows = records.len(),
        features = outcome.features.len(),
        skipped = outcome.skipped,
        "Built feature collection"
    );

    Ok(ExportOutcome {
        rows: records.len(),
        skipped: outcome.skipped,
        collection: FeatureCollection::new(outcome.features),
    })
}
