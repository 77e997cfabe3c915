use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// External text/image embedding collaborator.
///
/// Both methods return `None` when the provider has nothing to offer; the
/// caller treats that as an absent signal, never as an error.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn embed_text(&self, text: &str) -> Option<Vec<f32>>;

    async fn embed_image(&self, image_ref: &str) -> Option<Vec<f32>>;
}

/// Words that carry no identifying content in item descriptions.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "its", "with", "and", "on", "my", "of", "in", "at", "to", "for", "or",
];

/// Local, deterministic text embedder: a feature-hashed bag of words.
///
/// Each token is hashed with SHA-256 into one of `dimension` buckets. All
/// bucket weights are non-negative, so shared words always pull the cosine
/// up and disjoint descriptions land at a cosine of zero, which the scorer
/// rescales to a neutral 0.5. Has no visual model, so image
/// lookups return `None`.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dimension as u64) as usize
    }

    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if self.dimension == 0 {
            return None;
        }
        let mut vector = vec![0f32; self.dimension];
        let mut tokens = 0usize;
        for token in tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
            tokens += 1;
        }
        if tokens == 0 {
            return None;
        }
        Some(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        self.embed(text)
    }

    async fn embed_image(&self, _image_ref: &str) -> Option<Vec<f32>> {
        None
    }
}

/// Lowercased alphanumeric tokens with stopwords removed.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

#[derive(Serialize)]
struct TextRequest<'a> {
    input: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Remote embedding service speaking a minimal JSON protocol:
/// `POST {base}/embed/text {"input": ..}` and
/// `POST {base}/embed/image {"image": ..}`, both answering `{"embedding": [..]}`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: impl Into<String>, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            dimension,
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Option<Vec<f32>> {
        let url = format!("{}{}", self.base_url, path);
        let response = match self.client.post(&url).json(body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Embedding request to {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Embedding provider {} answered {}", url, response.status());
            return None;
        }

        match response.json::<EmbeddingResponse>().await {
            Ok(parsed) => {
                debug!("Embedding provider {} returned {} values", url, parsed.embedding.len());
                Some(parsed.embedding)
            }
            Err(e) => {
                warn!("Unreadable embedding response from {}: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, text: &str) -> Option<Vec<f32>> {
        self.post("/embed/text", &TextRequest { input: text }).await
    }

    async fn embed_image(&self, image_ref: &str) -> Option<Vec<f32>> {
        self.post("/embed/image", &ImageRequest { image: image_ref }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};

    #[test]
    fn tokenizer_drops_stopwords_and_punctuation() {
        let tokens: Vec<String> = tokenize("The black wallet, with cards!").collect();
        assert_eq!(tokens, vec!["black", "wallet", "cards"]);
    }

    #[test]
    fn hashing_is_deterministic_and_sized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("blue backpack").unwrap();
        let b = embedder.embed("Blue   BACKPACK").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_eq!(a.iter().sum::<f32>(), 2.0);
    }

    #[test]
    fn stopword_only_text_has_no_embedding() {
        let embedder = HashingEmbedder::new(64);
        assert!(embedder.embed("it is the").is_none());
        assert!(embedder.embed("").is_none());
    }

    #[tokio::test]
    async fn hashing_embedder_has_no_image_signal() {
        let embedder = HashingEmbedder::new(32);
        assert!(embedder.embed_image("photo.jpg").await.is_none());
    }

    async fn spawn_provider(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn http_embedder_reads_vectors() {
        let router = Router::new()
            .route("/embed/text", post(|| async { Json(serde_json::json!({ "embedding": [1.0, 0.0, 0.5] })) }))
            .route("/embed/image", post(|| async { Json(serde_json::json!({ "embedding": [0.0, 1.0, 0.0] })) }));
        let base = spawn_provider(router).await;

        let embedder = HttpEmbedder::new(base, 3, Duration::from_secs(5)).unwrap();
        assert_eq!(embedder.embed_text("keys").await, Some(vec![1.0, 0.0, 0.5]));
        assert_eq!(embedder.embed_image("a.png").await, Some(vec![0.0, 1.0, 0.0]));
    }

    #[tokio::test]
    async fn http_embedder_degrades_to_none() {
        let router = Router::new().route(
            "/embed/text",
            post(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let base = spawn_provider(router).await;

        let embedder = HttpEmbedder::new(base, 3, Duration::from_secs(5)).unwrap();
        assert!(embedder.embed_text("keys").await.is_none());
        // No route registered for images: 404.
        assert!(embedder.embed_image("a.png").await.is_none());
    }
}
