//! Construction des features GeoJSON à partir des enregistrements

use geo::Point;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::header::{normalize, HeaderKey};
use crate::record::Record;
use crate::types::CellValue;

/// Colonnes jouant les rôles identifiant / longitude / latitude
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Colonne de l'identifiant unique
    #[serde(deserialize_with = "normalized_key")]
    pub id: HeaderKey,

    /// Colonne de la longitude
    #[serde(deserialize_with = "normalized_key")]
    pub lon: HeaderKey,

    /// Colonne de la latitude
    #[serde(deserialize_with = "normalized_key")]
    pub lat: HeaderKey,
}

impl ColumnMapping {
    /// Construit un mapping depuis des en-têtes bruts ou déjà normalisés
    pub fn new(id: &str, lon: &str, lat: &str) -> Self {
        Self {
            id: normalize(id),
            lon: normalize(lon),
            lat: normalize(lat),
        }
    }
}

/// La normalisation est idempotente: on accepte l'en-tête brut comme la clé
fn normalized_key<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HeaderKey, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(normalize(&raw))
}

/// Une feature ponctuelle
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identifiant (texte ou nombre, tel que lu dans la cellule)
    pub id: CellValue,

    /// Position (x = longitude, y = latitude)
    pub geometry: Point<f64>,

    /// Ligne complète, colonnes id/lon/lat comprises
    pub properties: Record,
}

impl Feature {
    pub fn longitude(&self) -> f64 {
        self.geometry.x()
    }

    pub fn latitude(&self) -> f64 {
        self.geometry.y()
    }
}

/// Résultat de la construction: features retenues et lignes écartées
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutcome {
    pub features: Vec<Feature>,

    /// Lignes sans identifiant ou sans géométrie valide
    pub skipped: usize,
}

/// Construit les features, dans l'ordre des lignes.
///
/// Une ligne produit une feature si l'identifiant est "vrai" (non vide, non nul)
/// et si longitude et latitude sont numériques et non nulles. Une coordonnée
/// valant exactement 0 est donc considérée absente (équateur, méridien de
/// Greenwich): comportement conservé pour compatibilité des exports existants.
pub fn build(records: &[Record], mapping: &ColumnMapping) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();

    for (index, record) in records.iter().enumerate() {
        match build_feature(record, mapping) {
            Some(feature) => outcome.features.push(feature),
            None => {
                debug!(row = index, "Row skipped: missing id or geometry");
                outcome.skipped += 1;
            }
        }
    }

    outcome
}

fn build_feature(record: &Record, mapping: &ColumnMapping) -> Option<Feature> {
    let id = record.get(&mapping.id).filter(|id| id.is_truthy())?;

    let lon = parse_coordinate(record.get(&mapping.lon));
    let lat = parse_coordinate(record.get(&mapping.lat));
    if !usable_coordinate(lon) || !usable_coordinate(lat) {
        return None;
    }

    Some(Feature {
        id: id.clone(),
        geometry: Point::new(lon, lat),
        properties: record.clone(),
    })
}

fn usable_coordinate(value: f64) -> bool {
    value.is_finite() && value != 0.0
}

/// Lit une coordonnée: nombre tel quel, texte via son préfixe numérique
/// ("12.5°" -> 12.5), NaN sinon.
pub fn parse_coordinate(value: Option<&CellValue>) -> f64 {
    match value {
        Some(CellValue::Number(n)) => *n,
        Some(CellValue::Text(s)) => parse_float_prefix(s),
        _ => f64::NAN,
    }
}

fn parse_float_prefix(s: &str) -> f64 {
    match fast_float::parse_partial::<f64, _>(s.trim_start()) {
        Ok((value, _)) => value,
        Err(_) => f64::NAN,
    }
}
