use std::sync::Arc;
use std::time::Instant;

use newsgraph_core::traits::{DirectoryClient, LlmClient};
use newsgraph_core::types::InputItem;
use newsgraph_llm::PromptStore;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::fragment_processor::FragmentProcessor;
use crate::payload_builder;
use crate::results::PhaseResult;
use crate::{phase1_triage, phase2_extraction, phase3_quotes_data, phase4_relations};

/// Tuning the four phases share; lifted out of `Settings` so this crate
/// doesn't need to depend on `config`/`secrecy` just to read a handful of
/// values.
#[derive(Debug, Clone)]
pub struct PipelineTuning {
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub async_processing_threshold_chars: usize,
    pub working_language: String,
}

/// Whether an item's text is long enough that the caller should dispatch it
/// to a background job instead of processing inline (spec.md §4.10 step 2).
/// The controller itself has no background executor; that decision and its
/// execution belong to the HTTP surface and the job tracker.
pub fn requires_async_dispatch(item: &InputItem, tuning: &PipelineTuning) -> bool {
    item.text().chars().count() > tuning.async_processing_threshold_chars
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub duration_ms: u128,
}

/// The end-to-end result of running one item through the pipeline
/// (spec.md §4.10 step 7 and §7's graceful-degradation clause).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Rejected {
        request_id: Uuid,
        reason: String,
    },
    Persisted {
        request_id: Uuid,
        partial: bool,
        warnings: Vec<String>,
        timings: Vec<PhaseTiming>,
        #[serde(skip)]
        payload: Value,
    },
    Failed {
        request_id: Uuid,
        support_code: &'static str,
        message: String,
    },
}

/// Orchestrates a single item end-to-end (spec.md §4.10). Never resumes a
/// failed phase from a partial state: a phase's failure means the next
/// phase runs on that phase's declared fallback value, not on a retry of
/// the same phase.
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn process(
    item: &InputItem,
    llm: &Arc<dyn LlmClient>,
    directory: &Arc<dyn DirectoryClient>,
    tuning: &PipelineTuning,
    request_id: Uuid,
) -> ProcessingOutcome {
    let prompts = PromptStore::global();
    let mut processor = FragmentProcessor::new(request_id.to_string());
    let mut timings = Vec::new();
    let mut warnings = Vec::new();

    let phase1_start = Instant::now();
    let phase1 = phase1_triage::run(
        item,
        llm,
        prompts,
        &tuning.working_language,
        tuning.llm_max_tokens,
        tuning.llm_temperature,
    )
    .await;
    timings.push(PhaseTiming {
        phase: "phase1_triage",
        duration_ms: phase1_start.elapsed().as_millis(),
    });
    warnings.extend(phase1.warnings.clone());

    if phase1.is_rejected() {
        info!(request_id = %request_id, "item rejected at triage");
        return ProcessingOutcome::Rejected {
            request_id,
            reason: phase1.justification,
        };
    }

    let title = item.title();
    let source_type = item.source_type();
    let origin_country = item.origin_country();
    let source_date = item.source_date();
    let text_for_phase2 = phase1.text_for_next_phase().to_string();

    let phase2_start = Instant::now();
    let phase2 = phase2_extraction::run(
        &text_for_phase2,
        &title,
        &source_type,
        &origin_country,
        &source_date,
        &mut processor,
        llm,
        prompts,
        tuning.llm_max_tokens,
        tuning.llm_temperature,
    )
    .await;
    timings.push(PhaseTiming {
        phase: "phase2_extraction",
        duration_ms: phase2_start.elapsed().as_millis(),
    });
    if phase2.fallback_used() {
        warnings.push("phase_2_failed".to_string());
    }
    warnings.extend(phase2.warnings.clone());

    let phase3_start = Instant::now();
    let phase3 = phase3_quotes_data::run(
        &text_for_phase2,
        &title,
        &source_type,
        &origin_country,
        &source_date,
        &phase2,
        &mut processor,
        llm,
        prompts,
        tuning.llm_max_tokens,
        tuning.llm_temperature,
    )
    .await;
    timings.push(PhaseTiming {
        phase: "phase3_quotes_data",
        duration_ms: phase3_start.elapsed().as_millis(),
    });
    if phase3.fallback_used() {
        warnings.push("phase_3_failed".to_string());
    }
    warnings.extend(phase3.warnings.clone());

    let phase4_start = Instant::now();
    let phase4 = phase4_relations::run(
        &phase2,
        &phase3,
        directory,
        llm,
        prompts,
        tuning.llm_max_tokens,
        tuning.llm_temperature,
    )
    .await;
    timings.push(PhaseTiming {
        phase: "phase4_relations",
        duration_ms: phase4_start.elapsed().as_millis(),
    });
    if phase4.fallback_used() {
        warnings.push("phase_4_failed".to_string());
    }
    warnings.extend(phase4.warnings.clone());

    let partial = phase2.fallback_used() || phase3.fallback_used() || phase4.fallback_used();

    match payload_builder::build(item, &phase2, &phase3, &phase4) {
        Ok(payload) => {
            let insert_result = match item {
                InputItem::Article(_) => directory.atomic_insert_article(&payload).await,
                InputItem::Fragment(_) => directory.atomic_insert_fragment(&payload).await,
            };
            match insert_result {
                Ok(()) => ProcessingOutcome::Persisted {
                    request_id,
                    partial,
                    warnings,
                    timings,
                    payload,
                },
                Err(err) => {
                    warn!(request_id = %request_id, support_code = err.support_code(), "atomic insert failed");
                    ProcessingOutcome::Failed {
                        request_id,
                        support_code: err.support_code(),
                        message: err.to_string(),
                    }
                }
            }
        }
        Err(err) => {
            warn!(request_id = %request_id, support_code = err.support_code(), "payload assembly failed");
            ProcessingOutcome::Failed {
                request_id,
                support_code: err.support_code(),
                message: err.to_string(),
            }
        }
    }
}

pub fn payload_of(outcome: &ProcessingOutcome) -> Option<&Value> {
    match outcome {
        ProcessingOutcome::Persisted { payload, .. } => Some(payload),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn async_dispatch_threshold_is_exclusive() {
        let tuning = PipelineTuning {
            llm_max_tokens: 1024,
            llm_temperature: 0.0,
            async_processing_threshold_chars: 10_000,
            working_language: "en".to_string(),
        };
        let short = InputItem::Fragment(newsgraph_core::types::Fragment {
            fragment_id: "f1".into(),
            source_document_id: "d1".into(),
            sequence_position: 0,
            section_title: None,
            page_range: None,
            text: "x".repeat(9_999),
            metadata: Default::default(),
        });
        let long = InputItem::Fragment(newsgraph_core::types::Fragment {
            fragment_id: "f2".into(),
            source_document_id: "d1".into(),
            sequence_position: 0,
            section_title: None,
            page_range: None,
            text: "x".repeat(10_001),
            metadata: Default::default(),
        });
        assert!(!requires_async_dispatch(&short, &tuning));
        assert!(requires_async_dispatch(&long, &tuning));
    }
}
