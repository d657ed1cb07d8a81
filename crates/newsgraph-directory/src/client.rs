use std::time::Duration;

use async_trait::async_trait;
use newsgraph_core::error::{CoreError, Result};
use newsgraph_core::retry::with_backoff;
use newsgraph_core::traits::DirectoryClient;
use newsgraph_core::types::{DirectoryLink, EntityType};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Similarity threshold below which a candidate is treated as "not a match"
/// (spec.md §4.8 step 1).
pub const SIMILARITY_THRESHOLD: f32 = 0.8;

/// Singleton connection to the external entity directory and atomic-insert
/// store (spec.md §4.4). `reqwest::Client` is already internally pooled and
/// `Send + Sync`, satisfying "must be concurrency-safe" without an explicit
/// mutex, the same assumption the teacher's HTTP-backed providers make.
pub struct HttpDirectoryClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    max_retries: u32,
    max_wait: Duration,
}

impl HttpDirectoryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        max_retries: u32,
        max_wait_seconds: u64,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            max_retries,
            max_wait: Duration::from_secs(max_wait_seconds),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(self.api_key.expose_secret())
    }

    async fn insert(&self, path: &str, payload: &serde_json::Value) -> Result<()> {
        with_backoff("directory.atomic_insert", self.max_retries, self.max_wait, || async {
            let response = self
                .authed(self.client.post(format!("{}/{}", self.base_url, path)))
                .json(payload)
                .send()
                .await
                .map_err(|e| CoreError::directory_transient(format!("request failed: {e}")))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                return Err(CoreError::directory_transient(format!("{status}: {text}")));
            }
            if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST {
                let text = response.text().await.unwrap_or_default();
                return Err(CoreError::Storage(text));
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(CoreError::directory_permanent(format!("{status}: {text}")));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn find_similar_entity(
        &self,
        surface_text: &str,
        entity_type: EntityType,
    ) -> Result<Option<DirectoryLink>> {
        let query = SimilarityQuery {
            name: surface_text.to_string(),
            entity_type: entity_type.to_string(),
            threshold: SIMILARITY_THRESHOLD,
        };

        let candidates: Vec<SimilarityCandidate> = with_backoff(
            "directory.find_similar_entity",
            self.max_retries,
            self.max_wait,
            || async {
                let response = self
                    .authed(self.client.post(format!("{}/entities/similar", self.base_url)))
                    .json(&query)
                    .send()
                    .await
                    .map_err(|e| CoreError::directory_transient(format!("request failed: {e}")))?;

                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(CoreError::directory_transient(format!("{status}: {text}")));
                }
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(CoreError::directory_permanent(format!("{status}: {text}")));
                }

                response
                    .json::<Vec<SimilarityCandidate>>()
                    .await
                    .map_err(|e| CoreError::directory_transient(format!("malformed body: {e}")))
            },
        )
        .await?;

        Ok(candidates
            .into_iter()
            .filter(|c| c.score >= SIMILARITY_THRESHOLD)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap())
            .map(|c| DirectoryLink {
                directory_uuid: c.id,
                canonical_name: c.canonical_name,
                similarity_score: c.score,
                external_uri: c.uri,
            }))
    }

    async fn atomic_insert_article(&self, payload: &serde_json::Value) -> Result<()> {
        self.insert("articles/atomic_insert", payload).await
    }

    async fn atomic_insert_fragment(&self, payload: &serde_json::Value) -> Result<()> {
        self.insert("fragments/atomic_insert", payload).await
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .authed(self.client.get(format!("{}/health", self.base_url)))
            .send()
            .await
            .map_err(|e| CoreError::directory_transient(format!("ping failed: {e}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(CoreError::directory_transient(format!(
                "unhealthy: {}",
                response.status()
            )))
        }
    }
}

#[derive(Serialize)]
struct SimilarityQuery {
    name: String,
    entity_type: String,
    threshold: f32,
}

#[derive(Deserialize)]
struct SimilarityCandidate {
    id: Uuid,
    canonical_name: String,
    score: f32,
    uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_constructs_with_base_url() {
        let client = HttpDirectoryClient::new(
            "https://directory.example.com",
            SecretString::from("key".to_string()),
            3,
            60,
        );
        assert_eq!(client.base_url, "https://directory.example.com");
    }
}
