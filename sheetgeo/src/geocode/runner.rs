//! Exécution du géocodage: essais successifs, colonnes de sortie, idempotence
//!
//! Les adresses sont traitées une par une, dans l'ordre des lignes: les services
//! de géocodage ne tolèrent pas les rafales. Chaque ligne est écrite dès qu'elle
//! est résolue, une interruption conserve donc le travail déjà fait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::http::{HttpClient, Sleeper};
use super::provider::{GeoResult, GeocodingProvider, ProviderRegistry};
use super::retry::RetryPolicy;
use crate::grid::Grid;
use crate::header::{normalize_all, position_of, HeaderKey};
use crate::types::{CellValue, GridRange};
use crate::GeocodeError;

/// Issue d'une recherche d'adresse
#[derive(Debug)]
pub enum LookupOutcome {
    /// Réponse 200 obtenue (le résultat peut être vide si rien n'a été trouvé)
    Success { result: GeoResult, attempts: u32 },

    /// Tous les essais ont échoué
    Exhausted {
        attempts: u32,
        last_error: GeocodeError,
    },
}

impl LookupOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            LookupOutcome::Success { attempts, .. } | LookupOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LookupOutcome::Success { .. })
    }
}

/// Libellés des colonnes de sortie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLabels {
    pub longitude: String,
    pub latitude: String,
    pub accuracy: String,
}

impl Default for OutputLabels {
    fn default() -> Self {
        Self {
            longitude: "geo_longitude".into(),
            latitude: "geo_latitude".into(),
            accuracy: "geo_accuracy".into(),
        }
    }
}

impl OutputLabels {
    fn as_array(&self) -> [&str; 3] {
        [&self.longitude, &self.latitude, &self.accuracy]
    }
}

/// Positions des colonnes longitude / latitude / précision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputColumns {
    pub longitude: usize,
    pub latitude: usize,
    pub accuracy: usize,
}

impl OutputColumns {
    fn as_array(&self) -> [usize; 3] {
        [self.longitude, self.latitude, self.accuracy]
    }
}

/// Demande de géocodage d'une plage de grille
#[derive(Debug, Clone)]
pub struct GridGeocodeRequest {
    /// Plage des lignes à traiter (décalée si elle commence sur l'en-tête)
    pub range: GridRange,

    /// Ligne d'en-tête
    pub header_row: usize,

    /// Colonnes concaténées pour former l'adresse
    pub address_columns: Vec<HeaderKey>,

    /// Libellés des colonnes de sortie
    pub labels: OutputLabels,
}

/// Devenir d'une ligne
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    /// Coordonnées écrites
    Written { attempts: u32 },
    /// Réponse reçue mais sans correspondance
    NoMatch { attempts: u32 },
    /// Colonnes de sortie déjà remplies, aucune requête
    AlreadyGeocoded,
    /// Aucune adresse dans la ligne
    NoAddress,
    /// Essais épuisés
    Failed { attempts: u32, reason: String },
}

/// Résultat d'une ligne
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    pub row: usize,
    pub address: String,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

/// Bilan d'un géocodage de grille
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeocodeSummary {
    pub written: usize,
    pub no_match: usize,
    pub skipped: usize,
    pub no_address: usize,
    pub failed: usize,
    /// Colonnes de sortie ajoutées lors de ce passage
    pub columns_created: usize,
    pub rows: Vec<RowReport>,
}

impl GeocodeSummary {
    fn record(&mut self, row: usize, address: String, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Written { .. } => self.written += 1,
            RowOutcome::NoMatch { .. } => self.no_match += 1,
            RowOutcome::AlreadyGeocoded => self.skipped += 1,
            RowOutcome::NoAddress => self.no_address += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
        }
        self.rows.push(RowReport {
            row,
            address,
            outcome,
        });
    }
}

/// Orchestrateur: un fournisseur, une clé, une politique de retry
pub struct GeocodeRunner<C, S> {
    provider: Arc<dyn GeocodingProvider>,
    api_key: String,
    policy: RetryPolicy,
    client: C,
    sleeper: S,
}

impl<C: HttpClient, S: Sleeper> GeocodeRunner<C, S> {
    /// Vérifie la configuration avant toute requête réseau
    pub fn new(
        provider: Arc<dyn GeocodingProvider>,
        api_key: impl Into<String>,
        policy: RetryPolicy,
        client: C,
        sleeper: S,
    ) -> Result<Self, GeocodeError> {
        let api_key = api_key.into();
        if provider.requires_api_key() && api_key.trim().is_empty() {
            return Err(GeocodeError::MissingApiKey(provider.name()));
        }

        Ok(Self {
            provider,
            api_key,
            policy,
            client,
            sleeper,
        })
    }

    /// Sélectionne le fournisseur par nom; un nom inconnu échoue immédiatement
    pub fn from_registry(
        registry: &ProviderRegistry,
        provider: &str,
        api_key: impl Into<String>,
        policy: RetryPolicy,
        client: C,
        sleeper: S,
    ) -> Result<Self, GeocodeError> {
        let provider = registry.get(provider)?;
        Self::new(provider, api_key, policy, client, sleeper)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Géocode une adresse: PENDING -> essais 1..max -> SUCCESS | EXHAUSTED
    pub async fn lookup(&self, address: &str) -> LookupOutcome {
        let url = match self.provider.build_query(address, &self.api_key) {
            Ok(url) => url,
            Err(e) => {
                return LookupOutcome::Exhausted {
                    attempts: 0,
                    last_error: e,
                }
            }
        };

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.client.get(&url).await {
                Ok(response) if response.status == 200 => {
                    let result = match serde_json::from_str(&response.body) {
                        Ok(body) => self.provider.parse_response(&body),
                        Err(e) => {
                            warn!(provider = self.provider.name(), error = %e, "Response is not JSON");
                            GeoResult::empty()
                        }
                    };
                    return LookupOutcome::Success {
                        result,
                        attempts: attempt,
                    };
                }
                Ok(response) => GeocodeError::Status {
                    status: response.status,
                },
                Err(e) => e,
            };

            // Une erreur non récupérable ne sera pas corrigée par un nouvel essai
            if attempt >= max_attempts || !error.is_retryable() {
                warn!(address, attempts = attempt, error = %error, "Geocoding exhausted");
                return LookupOutcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }

            let delay = self.policy.delay_for_attempt(attempt);
            warn!(
                address,
                attempt,
                max_attempts,
                delay_secs = delay.as_secs_f64(),
                error = %error,
                "Geocoding failed, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }

    /// Géocode une liste d'adresses, séquentiellement; un échec n'arrête pas le lot
    pub async fn run(&self, addresses: &[String]) -> Vec<LookupOutcome> {
        let mut outcomes = Vec::with_capacity(addresses.len());
        for address in addresses {
            outcomes.push(self.lookup(address).await);
        }
        outcomes
    }

    /// Géocode les lignes d'une grille et écrit les résultats dans les colonnes de sortie.
    ///
    /// Les lignes dont les trois colonnes de sortie sont déjà remplies sont sautées
    /// sans requête, ce qui rend les relances incrémentales.
    pub async fn geocode_grid<G: Grid + ?Sized>(
        &self,
        grid: &mut G,
        request: &GridGeocodeRequest,
    ) -> Result<GeocodeSummary, GeocodeError> {
        let keys = normalize_all(&grid.headers(request.header_row)?);
        let address_positions = request
            .address_columns
            .iter()
            .map(|key| {
                position_of(&keys, key).ok_or_else(|| GeocodeError::MissingColumn(key.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut summary = GeocodeSummary::default();
        let (columns, created) = resolve_output_columns(grid, request.header_row, &request.labels)?;
        summary.columns_created = created;

        let data_range = request.range.below_header(request.header_row);
        info!(
            provider = self.provider.name(),
            rows = data_range.num_rows,
            columns_created = created,
            "Geocoding range"
        );

        for row in data_range.rows() {
            let cells = read_row(grid, row)?;

            let already = columns
                .as_array()
                .iter()
                .all(|&col| cells.get(col).is_some_and(|c| !c.is_empty()));
            if already {
                debug!(row, "Already geocoded, skipped");
                summary.record(row, String::new(), RowOutcome::AlreadyGeocoded);
                continue;
            }

            let address = build_address(&cells, &address_positions);
            if address.is_empty() {
                debug!(row, "No address");
                summary.record(row, address, RowOutcome::NoAddress);
                continue;
            }

            let (result, outcome) = match self.lookup(&address).await {
                LookupOutcome::Success { result, attempts } if result.is_empty() => {
                    (result, RowOutcome::NoMatch { attempts })
                }
                LookupOutcome::Success { result, attempts } => {
                    (result, RowOutcome::Written { attempts })
                }
                LookupOutcome::Exhausted {
                    attempts,
                    last_error,
                } => (
                    GeoResult::empty(),
                    RowOutcome::Failed {
                        attempts,
                        reason: last_error.to_string(),
                    },
                ),
            };

            // Écriture immédiate, ligne par ligne
            for (col, value) in columns.as_array().into_iter().zip(result.into_cells()) {
                grid.set_cell(row, col, value)?;
            }
            summary.record(row, address, outcome);
        }

        info!(
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            no_match = summary.no_match,
            "Geocoding done"
        );

        Ok(summary)
    }
}

/// Retrouve les colonnes de sortie par libellé, ou les ajoute après la dernière
/// colonne d'en-tête utilisée. Retourne les positions et le nombre de colonnes créées.
pub fn resolve_output_columns<G: Grid + ?Sized>(
    grid: &mut G,
    header_row: usize,
    labels: &OutputLabels,
) -> Result<(OutputColumns, usize), GeocodeError> {
    let headers = grid.headers(header_row)?;
    let labels = labels.as_array();

    let mut found: [Option<usize>; 3] = [None; 3];
    for (slot, label) in found.iter_mut().zip(labels) {
        *slot = headers.iter().position(|h| h.trim() == label);
    }

    let missing: Vec<usize> = (0..3).filter(|&i| found[i].is_none()).collect();
    if !missing.is_empty() {
        let (after, first_new) = match headers.iter().rposition(|h| !h.trim().is_empty()) {
            Some(col) => (col, col + 1),
            None => (grid.width().saturating_sub(1), grid.width()),
        };
        grid.append_columns(after, missing.len())?;

        for (offset, &i) in missing.iter().enumerate() {
            let col = first_new + offset;
            grid.set_cell(header_row, col, CellValue::from(labels[i]))?;
            found[i] = Some(col);
        }
    }

    let [Some(longitude), Some(latitude), Some(accuracy)] = found else {
        return Err(GeocodeError::MissingColumn("geocoding output".into()));
    };

    Ok((
        OutputColumns {
            longitude,
            latitude,
            accuracy,
        },
        missing.len(),
    ))
}

fn read_row<G: Grid + ?Sized>(grid: &G, row: usize) -> Result<Vec<CellValue>, GeocodeError> {
    let range = GridRange::new(row, 0, 1, grid.width());
    Ok(grid.cell_range(&range)?.into_iter().next().unwrap_or_default())
}

/// Concatène les valeurs non vides des colonnes d'adresse
fn build_address(cells: &[CellValue], positions: &[usize]) -> String {
    positions
        .iter()
        .filter_map(|&col| cells.get(col))
        .map(|c| c.to_text().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
