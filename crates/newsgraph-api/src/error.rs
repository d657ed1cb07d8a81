use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use newsgraph_core::CoreError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Translates the spec.md §7 error taxonomy into the `{success:false,
/// error:{...}}` envelope spec.md §6 requires of every failure response.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("{message}")]
    ItemFailed {
        request_id: Uuid,
        support_code: &'static str,
        message: String,
    },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::UpstreamTransient { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(CoreError::UpstreamPermanent { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Core(CoreError::PhaseInternal { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Core(CoreError::PayloadAssembly(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Storage(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Core(CoreError::Serialization(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Core(CoreError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::JobNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ItemFailed { support_code, .. } => match *support_code {
                "LLM-TRANSIENT" | "DIR-TRANSIENT" => StatusCode::SERVICE_UNAVAILABLE,
                "LLM-PERMANENT" | "DIR-PERMANENT" => StatusCode::BAD_GATEWAY,
                "PAYLOAD-0001" => StatusCode::BAD_REQUEST,
                "STORAGE-0001" => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Core(err) => match err {
                CoreError::Validation(_) => "validation_error",
                CoreError::UpstreamTransient { .. } => "upstream_unavailable",
                CoreError::UpstreamPermanent { .. } => "upstream_rejected",
                CoreError::PhaseInternal { .. } => "phase_internal_error",
                CoreError::PayloadAssembly(_) => "payload_assembly_error",
                CoreError::Storage(_) => "storage_rejected",
                CoreError::NotFound(_) => "not_found",
                CoreError::Serialization(_) => "serialization_error",
                CoreError::Io(_) => "io_error",
                CoreError::Configuration(_) => "configuration_error",
            },
            ApiError::BadRequest(_) => "bad_request",
            ApiError::JobNotFound(_) => "not_found",
            ApiError::ItemFailed { .. } => "item_processing_failed",
        }
    }

    fn support_code(&self) -> &'static str {
        match self {
            ApiError::Core(err) => err.support_code(),
            ApiError::BadRequest(_) => "API-BADREQUEST",
            ApiError::JobNotFound(_) => "API-JOB-NOTFOUND",
            ApiError::ItemFailed { support_code, .. } => support_code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let request_id = match &self {
            ApiError::ItemFailed { request_id, .. } => *request_id,
            _ => Uuid::new_v4(),
        };
        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "support_code": self.support_code(),
            },
            "request_id": request_id,
            "timestamp": Utc::now(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = ApiError::Core(CoreError::Validation("bad storage_path".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn upstream_permanent_maps_to_bad_gateway() {
        let err = ApiError::Core(CoreError::llm_permanent("bad api key"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn job_not_found_maps_to_404() {
        let err = ApiError::JobNotFound(Uuid::new_v4());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
