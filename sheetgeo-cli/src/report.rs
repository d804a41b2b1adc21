//! Rapports d'exécution (export et géocodage)
//!
//! Les lignes écartées ou en échec ne bloquent jamais un traitement: elles sont
//! comptées ici et déterminent le statut final.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use sheetgeo::geocode::{GeocodeSummary, RowOutcome, RowReport};
use sheetgeo::ExportOutcome;

use crate::export::SavedFile;

/// Statut global d'un traitement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    /// Toutes les lignes ont abouti
    Success,
    /// Certaines lignes ont été écartées ou ont échoué
    PartialSuccess,
    /// Aucune ligne n'a abouti
    Failed,
}

fn status_for(succeeded: usize, problems: usize) -> RunStatus {
    match (succeeded, problems) {
        (_, 0) => RunStatus::Success,
        (0, _) => RunStatus::Failed,
        _ => RunStatus::PartialSuccess,
    }
}

/// Rapport d'export GeoJSON
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Nom du document source
    pub document: String,
    pub duration_secs: f64,
    pub status: RunStatus,

    /// Lignes de données lues
    pub rows: usize,
    /// Features produites
    pub features: usize,
    /// Lignes sans identifiant ou coordonnées
    pub skipped: usize,

    /// Fichier GeoJSON produit
    pub output: Option<SavedFile>,
}

impl ExportReport {
    pub fn new(document: &str) -> Self {
        Self {
            document: document.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            rows: 0,
            features: 0,
            skipped: 0,
            output: None,
        }
    }

    /// Reprend les compteurs d'un export
    pub fn record_outcome(&mut self, outcome: &ExportOutcome) {
        self.rows = outcome.rows;
        self.features = outcome.collection.len();
        self.skipped = outcome.skipped;
    }

    pub fn set_output(&mut self, saved: SavedFile) {
        self.output = Some(saved);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = status_for(self.features, self.skipped);
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("EXPORT REPORT - {}", self.document);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Rows: {} read, {} features, {} skipped",
            self.rows, self.features, self.skipped
        );

        if let Some(output) = &self.output {
            println!("\n--- OUTPUT ---");
            println!("  {}", output.path.display());
            println!("  {}", output.url);
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        format!(
            "{}: {} features, {} skipped",
            self.document, self.features, self.skipped
        )
    }
}

/// Rapport de géocodage
#[derive(Debug, Clone, Serialize)]
pub struct GeocodeReport {
    pub document: String,
    pub provider: String,
    pub duration_secs: f64,
    pub status: RunStatus,

    pub written: usize,
    /// Réponses sans correspondance
    pub no_match: usize,
    /// Lignes déjà géocodées
    pub skipped: usize,
    pub no_address: usize,
    /// Lignes en échec, restées vides pour une relance
    pub failed: usize,
    pub columns_created: usize,

    /// Détail des lignes en échec
    pub failures: Vec<RowReport>,
}

impl GeocodeReport {
    pub fn new(document: &str, provider: &str) -> Self {
        Self {
            document: document.to_string(),
            provider: provider.to_string(),
            duration_secs: 0.0,
            status: RunStatus::Success,
            written: 0,
            no_match: 0,
            skipped: 0,
            no_address: 0,
            failed: 0,
            columns_created: 0,
            failures: Vec::new(),
        }
    }

    /// Reprend le bilan d'un géocodage de grille
    pub fn record_summary(&mut self, summary: &GeocodeSummary) {
        self.written = summary.written;
        self.no_match = summary.no_match;
        self.skipped = summary.skipped;
        self.no_address = summary.no_address;
        self.failed = summary.failed;
        self.columns_created = summary.columns_created;
        self.failures = summary
            .rows
            .iter()
            .filter(|r| matches!(r.outcome, RowOutcome::Failed { .. }))
            .cloned()
            .collect();
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Les lignes déjà géocodées comptent comme abouties
    pub fn finalize(&mut self) {
        self.status = status_for(self.written + self.skipped, self.failed);
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("GEOCODE REPORT - {} ({})", self.document, self.provider);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Rows: {} written, {} no match, {} already geocoded, {} without address, {} failed",
            self.written, self.no_match, self.skipped, self.no_address, self.failed
        );
        if self.columns_created > 0 {
            println!("Output columns created: {}", self.columns_created);
        }

        if !self.failures.is_empty() {
            println!("\n--- FAILURES ({}) ---", self.failures.len());
            for f in self.failures.iter().take(20) {
                if let RowOutcome::Failed { attempts, reason } = &f.outcome {
                    println!(
                        "  [row {}] {} ({} attempts): {}",
                        f.row + 1,
                        f.address,
                        attempts,
                        reason
                    );
                }
            }
            if self.failures.len() > 20 {
                println!("  ... and {} more", self.failures.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact
    pub fn summary(&self) -> String {
        format!(
            "{}: {} written, {} skipped, {} failed",
            self.document, self.written, self.skipped, self.failed
        )
    }
}
