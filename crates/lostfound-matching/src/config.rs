use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::MatchError;

/// Weights of the blended score. Must be non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub category: f64,
    pub color: f64,
    pub location: f64,
    pub text: f64,
    pub image: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            category: 0.20,
            color: 0.10,
            location: 0.10,
            text: 0.35,
            image: 0.25,
        }
    }
}

impl SignalWeights {
    pub fn validate(&self) -> Result<(), MatchError> {
        let all = [self.category, self.color, self.location, self.text, self.image];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MatchError::Config(format!("weights must be finite and non-negative: {:?}", self)));
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(MatchError::Config(format!("weights must sum to 1.0, got {}", sum)));
        }
        if self.category + self.color <= 0.0 {
            return Err(MatchError::Config("category and color weights cannot both be zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub weights: SignalWeights,
    /// Minimum blended score for a pair to be recorded. The default sits
    /// above what category agreement plus one more cheap attribute can reach
    /// when the descriptions share nothing.
    pub threshold: f64,
    /// Upper bound on notifications produced by one evaluation.
    pub max_results: usize,
    /// Length every text and image embedding must have.
    pub embedding_dim: usize,
    pub embed_timeout: Duration,
    /// How many opposing reports are extracted at once.
    pub extract_concurrency: usize,
    /// Drop pairs where the item was found before it was lost.
    pub require_date_order: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            threshold: 0.65,
            max_results: 10,
            embedding_dim: 256,
            embed_timeout: Duration::from_secs(2),
            extract_concurrency: 8,
            require_date_order: true,
        }
    }
}

impl MatchConfig {
    /// Reads `LOSTFOUND_*` overrides on top of the defaults and validates the result.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            weights: SignalWeights {
                category: env_or("LOSTFOUND_WEIGHT_CATEGORY", defaults.weights.category)?,
                color: env_or("LOSTFOUND_WEIGHT_COLOR", defaults.weights.color)?,
                location: env_or("LOSTFOUND_WEIGHT_LOCATION", defaults.weights.location)?,
                text: env_or("LOSTFOUND_WEIGHT_TEXT", defaults.weights.text)?,
                image: env_or("LOSTFOUND_WEIGHT_IMAGE", defaults.weights.image)?,
            },
            threshold: env_or("LOSTFOUND_MATCH_THRESHOLD", defaults.threshold)?,
            max_results: env_or("LOSTFOUND_MATCH_MAX_RESULTS", defaults.max_results)?,
            embedding_dim: env_or("LOSTFOUND_EMBEDDING_DIM", defaults.embedding_dim)?,
            embed_timeout: Duration::from_millis(env_or(
                "LOSTFOUND_EMBED_TIMEOUT_MS",
                defaults.embed_timeout.as_millis() as u64,
            )?),
            extract_concurrency: env_or("LOSTFOUND_EXTRACT_CONCURRENCY", defaults.extract_concurrency)?,
            require_date_order: env_or("LOSTFOUND_REQUIRE_DATE_ORDER", defaults.require_date_order)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MatchError> {
        self.weights.validate()?;
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(MatchError::Config(format!("threshold must be within [0, 1], got {}", self.threshold)));
        }
        if self.max_results == 0 {
            return Err(MatchError::Config("max_results must be at least 1".into()));
        }
        if self.embedding_dim == 0 {
            return Err(MatchError::Config("embedding_dim must be at least 1".into()));
        }
        if self.extract_concurrency == 0 {
            return Err(MatchError::Config("extract_concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
