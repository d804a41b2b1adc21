//! Destination des fichiers GeoJSON produits

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;
use url::Url;

use sheetgeo::file_stem;

/// Fichier enregistré et son URL de consultation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFile {
    pub path: PathBuf,
    pub url: String,
}

/// Destination capable d'enregistrer un fichier nommé
pub trait FileSink {
    fn save(&self, filename: &str, content: &str) -> Result<SavedFile>;
}

/// Écrit les fichiers dans un répertoire local
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FileSink for DirectorySink {
    fn save(&self, filename: &str, content: &str) -> Result<SavedFile> {
        std::fs::create_dir_all(&self.dir)
            .context(format!("Failed to create directory: {}", self.dir.display()))?;

        // Chemin absolu requis pour l'URL file://
        let dir = self
            .dir
            .canonicalize()
            .context(format!("Failed to resolve directory: {}", self.dir.display()))?;
        let path = dir.join(filename);

        std::fs::write(&path, content)
            .context(format!("Failed to write file: {}", path.display()))?;

        let url = Url::from_file_path(&path)
            .map_err(|_| anyhow::anyhow!("Cannot build file URL for {}", path.display()))?
            .to_string();

        info!(path = %path.display(), bytes = content.len(), "Saved file");

        Ok(SavedFile { path, url })
    }
}

/// Nom du fichier de sortie: `<nom normalisé ou unsaved>-<millisecondes>.geojson`
pub fn output_filename(document_name: &str, unix_millis: u128) -> String {
    format!("{}-{}.geojson", file_stem(document_name), unix_millis)
}

/// Horodatage courant en millisecondes depuis l'époque Unix
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
