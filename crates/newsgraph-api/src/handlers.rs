use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use newsgraph_core::types::{Article, Fragment, InputItem};
use newsgraph_core::validation::validate_storage_path;
use newsgraph_jobs::JobState;
use newsgraph_pipeline::{process, requires_async_dispatch, ProcessingOutcome};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, API_VERSION};

pub async fn process_article(
    State(state): State<AppState>,
    Json(article): Json<Article>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    validate_article_shape(&article)?;
    process_item(state, InputItem::Article(article)).await
}

pub async fn process_fragment(
    State(state): State<AppState>,
    Json(fragment): Json<Fragment>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    validate_fragment_shape(&fragment)?;
    process_item(state, InputItem::Fragment(fragment)).await
}

/// Shape validation beyond what serde's required-field deserialization
/// already enforces (spec.md §4.12 "validates shape"). A malformed
/// `storage_path` or empty body text never reaches the pipeline.
fn validate_article_shape(article: &Article) -> ApiResult<()> {
    validate_storage_path(&article.storage_path)
        .map_err(|e| ApiError::BadRequest(format!("storage_path: {e}")))?;
    if article.full_text.trim().is_empty() {
        return Err(ApiError::BadRequest("full_text must not be empty".to_string()));
    }
    if article.headline.trim().is_empty() {
        return Err(ApiError::BadRequest("headline must not be empty".to_string()));
    }
    Ok(())
}

fn validate_fragment_shape(fragment: &Fragment) -> ApiResult<()> {
    if fragment.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    if fragment.fragment_id.trim().is_empty() {
        return Err(ApiError::BadRequest("fragment_id must not be empty".to_string()));
    }
    Ok(())
}

/// Shared sync/async dispatch for both submission endpoints (spec.md
/// §4.10 step 2, §4.12). Long items are hashed off to a job immediately;
/// the caller polls `/status/{job_id}` for the eventual outcome.
async fn process_item(state: AppState, item: InputItem) -> ApiResult<(StatusCode, Json<Value>)> {
    let request_id = Uuid::new_v4();
    let timestamp = Utc::now();

    if requires_async_dispatch(&item, &state.tuning) {
        let job_id = state.jobs.create().await;
        let _ = state
            .jobs
            .update_state(job_id, JobState::Processing, None, None)
            .await;

        let llm = state.llm.clone();
        let directory = state.directory.clone();
        let tuning = state.tuning.clone();
        let jobs = state.jobs.clone();
        tokio::spawn(async move {
            let outcome = process(&item, &llm, &directory, &tuning, request_id).await;
            let (job_state, result, error) = outcome_to_job_fields(&outcome);
            let _ = jobs.update_state(job_id, job_state, result, error).await;
        });

        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "job_id": job_id,
                "status": "processing",
                "request_id": request_id,
                "timestamp": timestamp,
                "api_version": API_VERSION,
            })),
        ));
    }

    let outcome = process(&item, &state.llm, &state.directory, &state.tuning, request_id).await;
    outcome_to_response(outcome, timestamp)
}

fn outcome_to_response(
    outcome: ProcessingOutcome,
    timestamp: DateTime<Utc>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    match outcome {
        ProcessingOutcome::Rejected { request_id, reason } => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "rejected": true,
                "reason": reason,
                "request_id": request_id,
                "timestamp": timestamp,
                "api_version": API_VERSION,
            })),
        )),
        ProcessingOutcome::Persisted {
            request_id,
            partial,
            warnings,
            timings,
            payload,
        } => Ok((
            StatusCode::OK,
            Json(json!({
                "success": true,
                "request_id": request_id,
                "timestamp": timestamp,
                "api_version": API_VERSION,
                "data": {
                    "partial": partial,
                    "warnings": warnings,
                    "timings": timings,
                    "payload": payload,
                },
            })),
        )),
        ProcessingOutcome::Failed {
            request_id,
            support_code,
            message,
        } => Err(ApiError::ItemFailed {
            request_id,
            support_code,
            message,
        }),
    }
}

fn outcome_to_job_fields(outcome: &ProcessingOutcome) -> (JobState, Option<Value>, Option<String>) {
    match outcome {
        ProcessingOutcome::Rejected { reason, .. } => (
            JobState::Completed,
            Some(json!({"rejected": true, "reason": reason})),
            None,
        ),
        ProcessingOutcome::Persisted {
            partial,
            warnings,
            timings,
            payload,
            ..
        } => (
            JobState::Completed,
            Some(json!({
                "partial": partial,
                "warnings": warnings,
                "timings": timings,
                "payload": payload,
            })),
            None,
        ),
        ProcessingOutcome::Failed {
            support_code,
            message,
            ..
        } => (
            JobState::Failed,
            None,
            Some(format!("{support_code}: {message}")),
        ),
    }
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let record = state
        .jobs
        .get(job_id)
        .await
        .ok_or(ApiError::JobNotFound(job_id))?;

    Ok(Json(json!({
        "job_id": record.job_id,
        "state": record.state,
        "created_at": record.created_at,
        "updated_at": record.updated_at,
        "result": record.result,
        "error": record.error,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_outcome_serializes_as_success_with_rejected_flag() {
        let outcome = ProcessingOutcome::Rejected {
            request_id: Uuid::new_v4(),
            reason: "sports content".to_string(),
        };
        let (status, Json(body)) = outcome_to_response(outcome, Utc::now()).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rejected"], json!(true));
        assert_eq!(body["success"], json!(true));
    }

    #[test]
    fn failed_outcome_becomes_an_api_error() {
        let request_id = Uuid::new_v4();
        let outcome = ProcessingOutcome::Failed {
            request_id,
            support_code: "PAYLOAD-0001",
            message: "bad storage_path".to_string(),
        };
        let result = outcome_to_response(outcome, Utc::now());
        assert!(matches!(result, Err(ApiError::ItemFailed { support_code: "PAYLOAD-0001", .. })));
    }

    #[test]
    fn failed_outcome_carries_the_original_request_id() {
        let request_id = Uuid::new_v4();
        let outcome = ProcessingOutcome::Failed {
            request_id,
            support_code: "LLM-PERMANENT",
            message: "upstream rejected the request".to_string(),
        };
        let result = outcome_to_response(outcome, Utc::now());
        match result {
            Err(ApiError::ItemFailed { request_id: got, .. }) => assert_eq!(got, request_id),
            other => panic!("expected ItemFailed, got {other:?}"),
        }
    }

    fn sample_article() -> Article {
        Article {
            url: "https://example.com/a".to_string(),
            storage_path: "outlet/2026/07/28/article.html.gz".to_string(),
            outlet: "Example Times".to_string(),
            country: "US".to_string(),
            outlet_type: "newspaper".to_string(),
            headline: "Government announces tax reform".to_string(),
            published_at: Utc::now(),
            author: None,
            language: "en".to_string(),
            section: None,
            source_tags: vec![],
            is_opinion: false,
            is_official: false,
            full_text: "a long enough body of text".to_string(),
        }
    }

    #[test]
    fn article_with_malformed_storage_path_is_rejected() {
        let mut article = sample_article();
        article.storage_path = "not-a-valid-path".to_string();
        assert!(matches!(validate_article_shape(&article), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn article_with_empty_body_is_rejected() {
        let mut article = sample_article();
        article.full_text = "   ".to_string();
        assert!(matches!(validate_article_shape(&article), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn well_formed_article_passes_shape_validation() {
        assert!(validate_article_shape(&sample_article()).is_ok());
    }

    #[test]
    fn fragment_with_empty_text_is_rejected() {
        let fragment = Fragment {
            fragment_id: "frag-1".to_string(),
            source_document_id: "doc-1".to_string(),
            sequence_position: 0,
            section_title: None,
            page_range: None,
            text: "".to_string(),
            metadata: Default::default(),
        };
        assert!(matches!(validate_fragment_shape(&fragment), Err(ApiError::BadRequest(_))));
    }
}
