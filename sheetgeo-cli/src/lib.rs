//! # sheetgeo-cli
//!
//! Export GeoJSON et géocodage de fichiers tabulaires (CSV).
//!
//! ## Features
//!
//! - Lecture CSV avec détection d'encodage (UTF-8, sinon windows-1252 par défaut)
//! - Export d'une plage en FeatureCollection de points
//! - Géocodage incrémental: les lignes déjà géocodées ne sont pas redemandées
//! - Configuration par `.env`, fichier JSON et options CLI
//! - Rapports d'exécution en JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Export GeoJSON
//! sheetgeo export -i stations.csv --id "Station ID" --lon Lon --lat Lat -o ./geojson/
//!
//! # Géocodage (clé lue dans GEOCODER_API_KEY)
//! sheetgeo geocode -i addresses.csv -a Street -a City --provider mapbox
//! ```

pub mod cli;
pub mod config;
pub mod export;
pub mod report;

pub use config::{Config, GeocodeSettings};
pub use export::{DirectorySink, FileSink, SavedFile};
pub use report::{ExportReport, GeocodeReport, RunStatus};
