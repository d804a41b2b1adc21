//! Politique de retry (nombre d'essais + calendrier d'attente)

use std::time::Duration;

use crate::GeocodeError;

/// Nombre d'essais par défaut pour une adresse
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Attentes par défaut entre essais: courtes au début, plus longues ensuite
pub const DEFAULT_BACKOFF_SECS: [u64; 4] = [2, 2, 5, 10];

/// Nombre d'essais et attente après chaque échec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            schedule: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|&s| Duration::from_secs(s))
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Crée une politique; le calendrier doit être non vide et croissant (au sens large)
    pub fn new(max_attempts: u32, schedule: Vec<Duration>) -> Result<Self, GeocodeError> {
        if max_attempts == 0 {
            return Err(GeocodeError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        if schedule.is_empty() {
            return Err(GeocodeError::InvalidRetryPolicy(
                "backoff schedule is empty".into(),
            ));
        }
        if let Some(pos) = schedule.windows(2).position(|w| w[1] < w[0]) {
            return Err(GeocodeError::InvalidRetryPolicy(format!(
                "backoff schedule must be non-decreasing ({:?} then {:?})",
                schedule[pos],
                schedule[pos + 1]
            )));
        }

        Ok(Self {
            max_attempts,
            schedule,
        })
    }

    /// Raccourci avec un calendrier en secondes
    pub fn from_secs(max_attempts: u32, schedule: &[u64]) -> Result<Self, GeocodeError> {
        Self::new(
            max_attempts,
            schedule.iter().map(|&s| Duration::from_secs(s)).collect(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Attente après l'échec de l'essai `attempt` (à partir de 1).
    /// Au-delà du calendrier, la dernière valeur est répétée.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) as usize - 1).min(self.schedule.len() - 1);
        self.schedule[index]
    }
}
