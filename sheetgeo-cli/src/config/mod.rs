//! Configuration: fichier JSON, variables d'environnement et surcharges CLI
//!
//! Ordre de priorité (du plus faible au plus fort): valeurs par défaut,
//! environnement (`.env` compris), fichier de configuration, options CLI.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use sheetgeo::geocode::retry::{DEFAULT_BACKOFF_SECS, DEFAULT_MAX_ATTEMPTS};
use sheetgeo::geocode::{OutputLabels, RetryPolicy, DEFAULT_USER_AGENT};
use sheetgeo::{ColumnMapping, GeocodeError, HeaderKey};

/// Fournisseur utilisé quand rien n'est configuré (pas de clé requise)
pub const DEFAULT_PROVIDER: &str = "nominatim";

/// Délai réseau par défaut, en secondes
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fichier de configuration
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Colonnes id / longitude / latitude pour l'export
    pub mapping: Option<ColumnMapping>,

    /// Colonnes formant l'adresse, dans l'ordre de concaténation
    pub address_columns: Vec<String>,

    /// Paramètres du géocodeur
    pub geocoder: GeocoderConfig,

    /// Libellés des colonnes de sortie du géocodage
    pub labels: OutputLabels,
}

/// Section `geocoder` du fichier de configuration
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub max_attempts: Option<u32>,
    pub backoff_secs: Option<Vec<u64>>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge le fichier s'il est fourni, sinon une configuration vide
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Colonnes d'adresse normalisées
    pub fn address_keys(&self) -> Vec<HeaderKey> {
        self.address_columns
            .iter()
            .map(|c| HeaderKey::new(c))
            .collect()
    }
}

/// Paramètres effectifs du géocodage
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeSettings {
    pub provider: String,
    pub api_key: String,
    pub max_attempts: u32,
    pub backoff_secs: Vec<u64>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.into(),
            api_key: String::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

impl GeocodeSettings {
    /// Charge les paramètres depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Comme `from_env`, avec une source de variables arbitraire
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            provider: var("GEOCODER_PROVIDER")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.provider),
            api_key: var("GEOCODER_API_KEY").unwrap_or_default(),
            max_attempts: var("GEOCODER_MAX_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.max_attempts),
            backoff_secs: var("GEOCODER_BACKOFF")
                .and_then(|s| parse_backoff(&s))
                .unwrap_or(defaults.backoff_secs),
            timeout: var("GEOCODER_TIMEOUT")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            user_agent: var("GEOCODER_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    /// Applique la section `geocoder` d'un fichier de configuration
    pub fn apply_file(&mut self, file: &GeocoderConfig) {
        if let Some(provider) = &file.provider {
            self.provider = provider.clone();
        }
        if let Some(api_key) = &file.api_key {
            self.api_key = api_key.clone();
        }
        if let Some(max_attempts) = file.max_attempts {
            self.max_attempts = max_attempts;
        }
        if let Some(backoff) = &file.backoff_secs {
            self.backoff_secs = backoff.clone();
        }
        if let Some(timeout) = file.timeout_secs {
            self.timeout = Duration::from_secs(timeout);
        }
        if let Some(user_agent) = &file.user_agent {
            self.user_agent = user_agent.clone();
        }
    }

    /// Politique de retry validée
    pub fn retry_policy(&self) -> Result<RetryPolicy, GeocodeError> {
        RetryPolicy::from_secs(self.max_attempts, &self.backoff_secs)
    }
}

/// "2, 2, 5, 10" -> [2, 2, 5, 10]; `None` si une valeur est invalide
pub fn parse_backoff(raw: &str) -> Option<Vec<u64>> {
    let parsed: Result<Vec<u64>, _> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect();

    match parsed {
        Ok(secs) if !secs.is_empty() => Some(secs),
        Ok(_) => None,
        Err(e) => {
            warn!(value = raw, error = %e, "Invalid GEOCODER_BACKOFF, using defaults");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_settings_defaults() {
        let settings = GeocodeSettings::from_vars(|_| None);
        assert_eq!(settings.provider, "nominatim");
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.backoff_secs, vec![2, 2, 5, 10]);
        assert_eq!(settings.timeout, Duration::from_secs(30));
        assert!(settings.retry_policy().is_ok());
    }

    #[test]
    fn test_settings_from_vars() {
        let env = vars(&[
            ("GEOCODER_PROVIDER", "mapbox"),
            ("GEOCODER_API_KEY", "pk.test"),
            ("GEOCODER_MAX_ATTEMPTS", "3"),
            ("GEOCODER_BACKOFF", "1, 4"),
            ("GEOCODER_TIMEOUT", "5"),
        ]);
        let settings = GeocodeSettings::from_vars(|k| env.get(k).cloned());

        assert_eq!(settings.provider, "mapbox");
        assert_eq!(settings.api_key, "pk.test");
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.backoff_secs, vec![1, 4]);
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_settings_invalid_values_fall_back() {
        let env = vars(&[
            ("GEOCODER_PROVIDER", "  "),
            ("GEOCODER_MAX_ATTEMPTS", "many"),
            ("GEOCODER_BACKOFF", "2,x"),
        ]);
        let settings = GeocodeSettings::from_vars(|k| env.get(k).cloned());

        assert_eq!(settings.provider, "nominatim");
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.backoff_secs, vec![2, 2, 5, 10]);
    }

    #[test]
    fn test_apply_file_overrides_env() {
        let env = vars(&[("GEOCODER_PROVIDER", "google"), ("GEOCODER_API_KEY", "env")]);
        let mut settings = GeocodeSettings::from_vars(|k| env.get(k).cloned());
        settings.apply_file(&GeocoderConfig {
            api_key: Some("file".into()),
            backoff_secs: Some(vec![3]),
            ..Default::default()
        });

        assert_eq!(settings.provider, "google");
        assert_eq!(settings.api_key, "file");
        assert_eq!(settings.backoff_secs, vec![3]);
    }

    #[test]
    fn test_retry_policy_rejects_decreasing_schedule() {
        let settings = GeocodeSettings {
            backoff_secs: vec![10, 2],
            ..Default::default()
        };
        assert!(matches!(
            settings.retry_policy(),
            Err(GeocodeError::InvalidRetryPolicy(_))
        ));
    }

    #[test]
    fn test_parse_backoff() {
        assert_eq!(parse_backoff("2,2,5,10"), Some(vec![2, 2, 5, 10]));
        assert_eq!(parse_backoff(" 1 , 3 ,"), Some(vec![1, 3]));
        assert_eq!(parse_backoff(""), None);
        assert_eq!(parse_backoff("a"), None);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "mapping": {"id": "Unique ID", "lon": "Longitude", "lat": "Latitude"},
            "address_columns": ["Street", "City"],
            "geocoder": {"provider": "mapquest", "max_attempts": 2},
            "labels": {"accuracy": "geo_quality"}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        let mapping = config.mapping.as_ref().unwrap();
        assert_eq!(mapping.id.as_str(), "uniqueID");
        assert_eq!(
            config.address_keys(),
            vec![HeaderKey::from("street"), HeaderKey::from("city")]
        );
        assert_eq!(config.geocoder.provider.as_deref(), Some("mapquest"));
        assert_eq!(config.labels.accuracy, "geo_quality");
        assert_eq!(config.labels.longitude, "geo_longitude");
    }

    #[test]
    fn test_config_load_missing_file() {
        let path = std::env::temp_dir().join("sheetgeo-missing-config.json");
        let _ = std::fs::remove_file(&path);
        assert!(Config::load(&path).is_err());
        assert!(Config::load_optional(None).is_ok());
    }
}
