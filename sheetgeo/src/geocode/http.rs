//! Client HTTP et temporisation utilisés par le géocodage

use std::time::Duration;

use async_trait::async_trait;

use crate::GeocodeError;

/// User-Agent par défaut (Nominatim refuse les requêtes anonymes)
pub const DEFAULT_USER_AGENT: &str = concat!("sheetgeo/", env!("CARGO_PKG_VERSION"));

/// Réponse HTTP brute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Client HTTP GET.
///
/// Les erreurs de transport sont des `GeocodeError::Transport`; un statut non 200
/// n'est pas une erreur à ce niveau.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, GeocodeError>;
}

/// Client basé sur reqwest
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GeocodeError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, GeocodeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Transport(format!("Failed to read body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

/// Attente entre deux essais
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Attente réelle via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
