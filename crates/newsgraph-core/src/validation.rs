use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid format for field '{field}': {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("invalid length for field '{field}': expected at least {min} characters, got {actual}")]
    InvalidLength {
        field: String,
        min: usize,
        actual: usize,
    },

    #[error("value out of range for field '{field}': expected {min}-{max}, got {value}")]
    ValueOutOfRange {
        field: String,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("required field '{field}' is missing or empty")]
    RequiredField { field: String },

    #[error("unknown vocabulary value for field '{field}': {value}")]
    UnknownVocabulary { field: String, value: String },
}

lazy_static! {
    /// spec.md §3 "Articles ... storage_path": `<outlet>/<YYYY>/<MM>/<DD>/<slug>.<ext>.gz`,
    /// `ext` one of `html`/`txt`. This is the single admissibility gate the
    /// Payload Builder runs before an article can be persisted (spec.md §4.9).
    static ref STORAGE_PATH_RE: Regex =
        Regex::new(r"^[^/]+/\d{4}/\d{2}/\d{2}/[^/]+\.(html|txt)\.gz$").unwrap();
}

/// Validates `Article::storage_path` against the layout the store expects.
pub fn validate_storage_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "storage_path".to_string(),
        });
    }
    if !STORAGE_PATH_RE.is_match(path) {
        return Err(ValidationError::InvalidFormat {
            field: "storage_path".to_string(),
            reason: "expected <outlet>/<yyyy>/<mm>/<dd>/<slug>.(html|txt).gz".to_string(),
        });
    }
    Ok(())
}

/// A 1-10 style relevance/strength/importance score, used across facts,
/// quotes, and all four relation kinds (spec.md §3).
pub fn validate_score(field: &str, value: u8, min: u8, max: u8) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::ValueOutOfRange {
            field: field.to_string(),
            min: min as i64,
            max: max as i64,
            value: value as i64,
        });
    }
    Ok(())
}

/// spec.md §5 edge case: quotes shorter than five characters are dropped,
/// not persisted with a warning — this just reports the verdict.
pub fn validate_quote_text(text: &str) -> Result<(), ValidationError> {
    let len = text.trim().chars().count();
    if len < 5 {
        return Err(ValidationError::InvalidLength {
            field: "quote.text".to_string(),
            min: 5,
            actual: len,
        });
    }
    Ok(())
}

/// spec.md §5: a quantitative datum's `indicator` label must be at least
/// three characters so generic placeholders like "N" don't reach the store.
pub fn validate_indicator(indicator: &str) -> Result<(), ValidationError> {
    let len = indicator.trim().chars().count();
    if len < 3 {
        return Err(ValidationError::InvalidLength {
            field: "quantitative_datum.indicator".to_string(),
            min: 3,
            actual: len,
        });
    }
    Ok(())
}

/// Two-letter ISO-639-1-shaped language code, used to validate
/// `WORKING_LANGUAGE` and `Article::language`.
pub fn validate_language_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "language".to_string(),
            reason: "expected a 2-letter language code".to_string(),
        });
    }
    Ok(())
}
