//! Routing-level tests against the four spec.md §4.12 endpoints, driven
//! through the real router with hand-written fake upstreams (no network) —
//! the same fake-client approach `newsgraph-pipeline`'s scenario tests use,
//! applied one layer up at the HTTP boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use newsgraph_api::{create_router, AppState};
use newsgraph_core::traits::{CompletionRequest, CompletionResponse, DirectoryClient, LlmClient};
use newsgraph_core::types::{Article, DirectoryLink, EntityType};
use newsgraph_core::Result;
use newsgraph_jobs::JobTracker;
use newsgraph_pipeline::PipelineTuning;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

struct AlwaysFailLlm;

#[async_trait]
impl LlmClient for AlwaysFailLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(newsgraph_core::CoreError::llm_permanent("no upstream in this test"))
    }
}

struct FakeDirectory {
    reachable: bool,
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn find_similar_entity(
        &self,
        _surface_text: &str,
        _entity_type: EntityType,
    ) -> Result<Option<DirectoryLink>> {
        Ok(None)
    }

    async fn atomic_insert_article(&self, _payload: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn atomic_insert_fragment(&self, _payload: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(newsgraph_core::CoreError::directory_transient("unreachable in this test"))
        }
    }
}

fn test_state(directory_reachable: bool) -> AppState {
    AppState {
        llm: Arc::new(AlwaysFailLlm),
        directory: Arc::new(FakeDirectory {
            reachable: directory_reachable,
        }),
        jobs: Arc::new(JobTracker::new(Duration::from_secs(3600), 1000)),
        tuning: PipelineTuning {
            llm_max_tokens: 1024,
            llm_temperature: 0.0,
            async_processing_threshold_chars: 10_000,
            working_language: "en".to_string(),
        },
    }
}

fn sample_article(body: &str) -> Article {
    Article {
        url: "https://example.com/a".to_string(),
        storage_path: "outlet/2026/07/28/article.html.gz".to_string(),
        outlet: "Example Times".to_string(),
        country: "US".to_string(),
        outlet_type: "newspaper".to_string(),
        headline: "Government announces tax reform".to_string(),
        published_at: chrono::Utc::now(),
        author: None,
        language: "en".to_string(),
        section: None,
        source_tags: vec![],
        is_opinion: false,
        is_official: false,
        full_text: body.to_string(),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_degraded_when_directory_unreachable() {
    let router = create_router(test_state(false));
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("degraded"));
}

#[tokio::test]
async fn health_reports_ok_when_directory_reachable() {
    let router = create_router(test_state(true));
    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn long_article_dispatches_async_and_returns_202() {
    let router = create_router(test_state(true));
    let article = sample_article(&"x".repeat(15_000));
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/process_article")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&article).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("processing"));
    assert!(body["job_id"].is_string());
}

#[tokio::test]
async fn status_of_unknown_job_is_404() {
    let router = create_router(test_state(true));
    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/status/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_of_dispatched_job_is_initially_pending_or_processing() {
    let router = create_router(test_state(true));
    let article = sample_article(&"x".repeat(15_000));
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/process_article")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&article).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    let job_id = body["job_id"].as_str().unwrap();

    let status_response = router
        .oneshot(
            Request::builder()
                .uri(format!("/status/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(status_response.status(), StatusCode::OK);
    let status_body = body_json(status_response).await;
    let state = status_body["state"].as_str().unwrap();
    assert!(state == "processing" || state == "completed" || state == "failed");
}
