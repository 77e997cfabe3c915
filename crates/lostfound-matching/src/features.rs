use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use lostfound_types::models::ItemReport;

use crate::config::MatchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::MatchError;

/// Comparable representation of one report. Derived on demand, never patched:
/// if the report changes, extract again.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub category: String,
    pub colors: BTreeSet<String>,
    /// Normalized place description; `None` when blank.
    pub location: Option<String>,
    /// L2-normalized text embedding, if any.
    pub text: Option<Vec<f32>>,
    /// L2-normalized image embedding, if any.
    pub image: Option<Vec<f32>>,
}

pub struct FeatureExtractor {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    timeout: Duration,
}

impl FeatureExtractor {
    /// Fails when the provider's dimension disagrees with the configured one.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &MatchConfig) -> Result<Self, MatchError> {
        if provider.dimension() != config.embedding_dim {
            return Err(MatchError::Config(format!(
                "embedding provider produces {} dimensions, configuration expects {}",
                provider.dimension(),
                config.embedding_dim
            )));
        }
        Ok(Self {
            provider,
            dimension: config.embedding_dim,
            timeout: config.embed_timeout,
        })
    }

    pub async fn extract(&self, report: &ItemReport) -> Result<FeatureVector, MatchError> {
        let category = normalize_label(&report.category);
        if category.is_empty() {
            return Err(MatchError::InvalidReport {
                id: report.id,
                reason: "category is blank".into(),
            });
        }

        let text = match report.comparison_text() {
            Some(text) => {
                let raw = self.bounded(report.id, "text", self.provider.embed_text(&text)).await;
                raw.and_then(|v| self.accept(report.id, "text", v))
            }
            None => None,
        };

        let image = match (&report.image_embedding, report.images.first()) {
            (Some(supplied), _) => self.accept(report.id, "image", supplied.clone()),
            (None, Some(image_ref)) => {
                let raw = self.bounded(report.id, "image", self.provider.embed_image(image_ref)).await;
                raw.and_then(|v| self.accept(report.id, "image", v))
            }
            (None, None) => None,
        };

        Ok(FeatureVector {
            category,
            colors: color_tokens(&report.color),
            location: Some(normalize_label(&report.location)).filter(|l| !l.is_empty()),
            text,
            image,
        })
    }

    async fn bounded<F>(&self, id: Uuid, signal: &str, lookup: F) -> Option<Vec<f32>>
    where
        F: Future<Output = Option<Vec<f32>>>,
    {
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(vector) => vector,
            Err(_) => {
                warn!("{} embedding for report {} timed out after {:?}", signal, id, self.timeout);
                None
            }
        }
    }

    /// Validates length and content, then normalizes. Anything unusable is
    /// an absent signal.
    fn accept(&self, id: Uuid, signal: &str, mut vector: Vec<f32>) -> Option<Vec<f32>> {
        if vector.len() != self.dimension {
            warn!(
                "Dropping {} embedding for report {}: {} dimensions, expected {}",
                signal,
                id,
                vector.len(),
                self.dimension
            );
            return None;
        }
        if vector.iter().any(|v| !v.is_finite()) {
            warn!("Dropping {} embedding for report {}: non-finite values", signal, id);
            return None;
        }
        if !l2_normalize_in_place(&mut vector) {
            debug!("Treating all-zero {} embedding for report {} as absent", signal, id);
            return None;
        }
        Some(vector)
    }
}

/// Trimmed, lowercased, inner whitespace collapsed.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A color field may list several colors ("Black, Silver" or "black/red").
pub fn color_tokens(raw: &str) -> BTreeSet<String> {
    raw.split([',', '/'])
        .map(normalize_label)
        .filter(|c| !c.is_empty())
        .collect()
}

/// Returns false, leaving the vector untouched, when its norm is zero.
fn l2_normalize_in_place(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm <= f64::EPSILON {
        return false;
    }
    let inv = 1.0 / norm;
    for x in v.iter_mut() {
        *x = (*x as f64 * inv) as f32;
    }
    true
}
