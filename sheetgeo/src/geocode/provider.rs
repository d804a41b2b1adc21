//! Fournisseurs de géocodage et registre par nom
//!
//! Chaque fournisseur sait construire l'URL de requête et lire sa réponse JSON.
//! La lecture ne peut pas échouer: une réponse inattendue donne un résultat vide.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::types::CellValue;
use crate::GeocodeError;

/// Résultat d'un géocodage: longitude, latitude et précision
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoResult {
    pub longitude: CellValue,
    pub latitude: CellValue,
    pub accuracy: CellValue,
}

impl GeoResult {
    /// Résultat vide (aucune correspondance ou réponse illisible)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Aucune coordonnée exploitable
    pub fn is_empty(&self) -> bool {
        self.longitude.is_empty() && self.latitude.is_empty()
    }

    /// Valeurs dans l'ordre des colonnes de sortie
    pub fn into_cells(self) -> [CellValue; 3] {
        [self.longitude, self.latitude, self.accuracy]
    }
}

/// Stratégie de géocodage
pub trait GeocodingProvider: Send + Sync {
    /// Nom utilisé dans le registre
    fn name(&self) -> &'static str;

    /// Le fournisseur exige-t-il une clé API ?
    fn requires_api_key(&self) -> bool {
        true
    }

    /// URL GET pour une adresse
    fn build_query(&self, address: &str, api_key: &str) -> Result<String, GeocodeError>;

    /// Lecture stricte de la réponse; `None` si le format ne correspond pas
    fn extract(&self, body: &Value) -> Option<GeoResult>;

    /// Lecture tolérante: toute incohérence donne un résultat vide
    fn parse_response(&self, body: &Value) -> GeoResult {
        self.extract(body).unwrap_or_else(|| {
            debug!(provider = self.name(), "Unexpected response shape, empty result");
            GeoResult::empty()
        })
    }
}

/// Convertit une valeur JSON en cellule (nombre, texte, sinon vide)
fn cell(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) if !s.is_empty() => CellValue::Text(s.clone()),
        _ => CellValue::Empty,
    }
}

fn parse_base(provider: &'static str, base_url: &str) -> Result<Url, GeocodeError> {
    Url::parse(base_url).map_err(|e| GeocodeError::invalid_query(provider, e.to_string()))
}

/// Mapbox Geocoding API v5
#[derive(Debug, Clone)]
pub struct Mapbox {
    base_url: String,
}

impl Default for Mapbox {
    fn default() -> Self {
        Self::with_base_url("https://api.mapbox.com/geocoding/v5/mapbox.places/")
    }
}

impl Mapbox {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl GeocodingProvider for Mapbox {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    fn build_query(&self, address: &str, api_key: &str) -> Result<String, GeocodeError> {
        let mut url = parse_base(self.name(), &self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| GeocodeError::invalid_query(self.name(), "base URL cannot be a base"))?
            .pop_if_empty()
            .push(&format!("{}.json", address));
        url.query_pairs_mut()
            .append_pair("access_token", api_key)
            .append_pair("limit", "1");
        Ok(url.into())
    }

    fn extract(&self, body: &Value) -> Option<GeoResult> {
        let feature = body.get("features")?.as_array()?.first()?;
        let center = feature.get("center")?.as_array()?;
        if center.len() < 2 {
            return None;
        }
        Some(GeoResult {
            longitude: cell(&center[0]),
            latitude: cell(&center[1]),
            accuracy: cell(&feature["relevance"]),
        })
    }
}

/// Google Geocoding API
#[derive(Debug, Clone)]
pub struct Google {
    base_url: String,
}

impl Default for Google {
    fn default() -> Self {
        Self::with_base_url("https://maps.googleapis.com/maps/api/geocode/json")
    }
}

impl Google {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl GeocodingProvider for Google {
    fn name(&self) -> &'static str {
        "google"
    }

    fn build_query(&self, address: &str, api_key: &str) -> Result<String, GeocodeError> {
        let mut url = parse_base(self.name(), &self.base_url)?;
        url.query_pairs_mut()
            .append_pair("address", address)
            .append_pair("key", api_key);
        Ok(url.into())
    }

    fn extract(&self, body: &Value) -> Option<GeoResult> {
        if body.get("status")?.as_str()? != "OK" {
            return None;
        }
        let geometry = body.get("results")?.as_array()?.first()?.get("geometry")?;
        let location = geometry.get("location")?;
        Some(GeoResult {
            longitude: cell(&location["lng"]),
            latitude: cell(&location["lat"]),
            accuracy: cell(&geometry["location_type"]),
        })
    }
}

/// MapQuest Geocoding API v1
#[derive(Debug, Clone)]
pub struct MapQuest {
    base_url: String,
}

impl Default for MapQuest {
    fn default() -> Self {
        Self::with_base_url("https://www.mapquestapi.com/geocoding/v1/address")
    }
}

impl MapQuest {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl GeocodingProvider for MapQuest {
    fn name(&self) -> &'static str {
        "mapquest"
    }

    fn build_query(&self, address: &str, api_key: &str) -> Result<String, GeocodeError> {
        let mut url = parse_base(self.name(), &self.base_url)?;
        url.query_pairs_mut()
            .append_pair("key", api_key)
            .append_pair("location", address)
            .append_pair("maxResults", "1");
        Ok(url.into())
    }

    fn extract(&self, body: &Value) -> Option<GeoResult> {
        let location = body
            .get("results")?
            .as_array()?
            .first()?
            .get("locations")?
            .as_array()?
            .first()?;
        let lat_lng = location.get("latLng")?;
        Some(GeoResult {
            longitude: cell(&lat_lng["lng"]),
            latitude: cell(&lat_lng["lat"]),
            accuracy: cell(&location["geocodeQuality"]),
        })
    }
}

/// Nominatim (OpenStreetMap), sans clé
#[derive(Debug, Clone)]
pub struct Nominatim {
    base_url: String,
}

impl Default for Nominatim {
    fn default() -> Self {
        Self::with_base_url("https://nominatim.openstreetmap.org/search")
    }
}

impl Nominatim {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl GeocodingProvider for Nominatim {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    fn build_query(&self, address: &str, api_key: &str) -> Result<String, GeocodeError> {
        let mut url = parse_base(self.name(), &self.base_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", address)
                .append_pair("format", "jsonv2")
                .append_pair("limit", "1");
            // La "clé" sert d'adresse de contact, recommandée par la politique d'usage
            if !api_key.is_empty() {
                query.append_pair("email", api_key);
            }
        }
        Ok(url.into())
    }

    fn extract(&self, body: &Value) -> Option<GeoResult> {
        let place = body.as_array()?.first()?;
        Some(GeoResult {
            longitude: cell(place.get("lon")?),
            latitude: cell(place.get("lat")?),
            accuracy: cell(&place["importance"]),
        })
    }
}

/// Registre des fournisseurs, indexé par nom
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, Arc<dyn GeocodingProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Registre vide
    pub fn new() -> Self {
        Self::default()
    }

    /// Registre avec les fournisseurs intégrés
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Mapbox::default());
        registry.register(Google::default());
        registry.register(MapQuest::default());
        registry.register(Nominatim::default());
        registry
    }

    /// Ajoute (ou remplace) un fournisseur
    pub fn register<P: GeocodingProvider + 'static>(&mut self, provider: P) {
        self.providers.insert(provider.name(), Arc::new(provider));
    }

    /// Recherche par nom (insensible à la casse). Un nom inconnu est une erreur de configuration.
    pub fn get(&self, name: &str) -> Result<Arc<dyn GeocodingProvider>, GeocodeError> {
        let wanted = name.trim().to_lowercase();
        self.providers
            .get(wanted.as_str())
            .cloned()
            .ok_or_else(|| GeocodeError::UnknownProvider {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Noms disponibles, triés
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }
}
