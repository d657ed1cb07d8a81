use thiserror::Error;

/// The error taxonomy from spec.md §7: one variant family per policy bucket
/// (validation rejects, upstream-transient retries-then-falls-back, etc).
/// Every public operation in the pipeline returns `Result<T>` built on this.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream transport error ({kind}): {message}")]
    UpstreamTransient { kind: String, message: String },

    #[error("upstream rejected the request ({kind}): {message}")]
    UpstreamPermanent { kind: String, message: String },

    #[error("phase-internal error in {phase}: {message}")]
    PhaseInternal { phase: String, message: String },

    #[error("payload assembly failed: {0}")]
    PayloadAssembly(String),

    #[error("storage rejected the item: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Stable short code for correlating errors across logs and HTTP
    /// responses (spec.md §7: "every error carries a `support_code`").
    pub fn support_code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VAL-0001",
            CoreError::UpstreamTransient { kind, .. } => match kind.as_str() {
                "llm" => "LLM-TRANSIENT",
                "directory" => "DIR-TRANSIENT",
                _ => "UPSTREAM-TRANSIENT",
            },
            CoreError::UpstreamPermanent { kind, .. } => match kind.as_str() {
                "llm" => "LLM-PERMANENT",
                "directory" => "DIR-PERMANENT",
                _ => "UPSTREAM-PERMANENT",
            },
            CoreError::PhaseInternal { .. } => "PHASE-INTERNAL",
            CoreError::PayloadAssembly(_) => "PAYLOAD-0001",
            CoreError::Storage(_) => "STORAGE-0001",
            CoreError::NotFound(_) => "NOT-FOUND",
            CoreError::Serialization(_) => "SER-0001",
            CoreError::Io(_) => "IO-0001",
            CoreError::Configuration(_) => "CONFIG-0001",
        }
    }

    /// Whether this error class is defined as retryable at the call site
    /// (spec.md §7: upstream-transient retries, upstream-permanent does not).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::UpstreamTransient { .. })
    }

    pub fn llm_transient(message: impl Into<String>) -> Self {
        CoreError::UpstreamTransient {
            kind: "llm".to_string(),
            message: message.into(),
        }
    }

    pub fn llm_permanent(message: impl Into<String>) -> Self {
        CoreError::UpstreamPermanent {
            kind: "llm".to_string(),
            message: message.into(),
        }
    }

    pub fn directory_transient(message: impl Into<String>) -> Self {
        CoreError::UpstreamTransient {
            kind: "directory".to_string(),
            message: message.into(),
        }
    }

    pub fn directory_permanent(message: impl Into<String>) -> Self {
        CoreError::UpstreamPermanent {
            kind: "directory".to_string(),
            message: message.into(),
        }
    }

    pub fn phase(phase: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::PhaseInternal {
            phase: phase.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_codes_are_stable() {
        assert_eq!(CoreError::llm_transient("timeout").support_code(), "LLM-TRANSIENT");
        assert_eq!(
            CoreError::directory_permanent("bad auth").support_code(),
            "DIR-PERMANENT"
        );
        assert_eq!(CoreError::Validation("x".into()).support_code(), "VAL-0001");
    }

    #[test]
    fn only_upstream_transient_is_retryable() {
        assert!(CoreError::llm_transient("timeout").is_retryable());
        assert!(!CoreError::llm_permanent("bad key").is_retryable());
        assert!(!CoreError::Validation("x".into()).is_retryable());
    }
}
