//! Types d'erreurs pour le crate sheetgeo

use thiserror::Error;

/// Erreurs d'accès à la grille de cellules
#[derive(Debug, Error)]
pub enum SheetError {
    /// Cellule ou plage hors de la grille
    #[error("Out of range: {what} ({index} >= {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

impl SheetError {
    /// Crée une erreur hors limites
    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::OutOfRange { what, index, len }
    }
}

/// Erreurs du géocodage
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Fournisseur inconnu dans le registre (erreur de configuration)
    #[error("Unknown geocoding provider: {name}. Available: {available}")]
    UnknownProvider { name: String, available: String },

    /// Clé API absente pour un fournisseur qui en exige une
    #[error("Provider {0} requires an API key")]
    MissingApiKey(&'static str),

    /// Colonne introuvable dans la ligne d'en-tête
    #[error("Column not found: {0}")]
    MissingColumn(String),

    /// Politique de retry invalide
    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),

    /// URL de requête impossible à construire
    #[error("Invalid query for {provider}: {reason}")]
    InvalidQuery {
        provider: &'static str,
        reason: String,
    },

    /// Échec de transport (connexion, timeout, ...)
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Réponse HTTP hors 200
    #[error("HTTP status {status}")]
    Status { status: u16 },

    /// Erreur de la grille pendant l'écriture des résultats
    #[error(transparent)]
    Sheet(#[from] SheetError),
}

impl GeocodeError {
    /// Crée une erreur de requête invalide
    pub fn invalid_query(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            provider,
            reason: reason.into(),
        }
    }

    /// Erreurs récupérables par un nouvel essai
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}
