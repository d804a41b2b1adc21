//! Géocodage d'adresses: fournisseurs, politique de retry et exécution

pub mod http;
pub mod provider;
pub mod retry;
pub mod runner;

pub use http::{HttpClient, HttpResponse, ReqwestClient, Sleeper, TokioSleeper, DEFAULT_USER_AGENT};
pub use provider::{GeoResult, GeocodingProvider, ProviderRegistry};
pub use retry::RetryPolicy;
pub use runner::{
    GeocodeRunner, GeocodeSummary, GridGeocodeRequest, LookupOutcome, OutputColumns,
    OutputLabels, RowOutcome, RowReport,
};
