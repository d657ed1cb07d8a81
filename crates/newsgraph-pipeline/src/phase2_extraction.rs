use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use newsgraph_core::traits::{ChatMessage, CompletionRequest, LlmClient};
use newsgraph_core::types::{DateRange, Entity, EntityType, Fact, FactType, TemporalPrecision};
use newsgraph_llm::PromptStore;
use serde::Deserialize;

use crate::fragment_processor::FragmentProcessor;
use crate::results::Phase2Result;

#[derive(Debug, Deserialize)]
struct LlmDateRange {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmFact {
    content: String,
    #[serde(default)]
    date: Option<LlmDateRange>,
    temporal_precision: String,
    #[serde(rename = "type")]
    fact_type: String,
    #[serde(default)]
    countries: Vec<String>,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    cities: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    is_future_event: bool,
    #[serde(default)]
    scheduling_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmEntity {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    dissolution_date: Option<String>,
}

/// Top-level shape is parsed strictly, but each fact/entity record is kept as
/// a loose `Value` so one malformed record can't sink the whole array — a
/// single `serde_json::from_str::<ExtractionLlmOutput>` over strict per-record
/// structs would fail the entire response on one bad record, which the spec
/// forbids (bad records are dropped with a warning, not the whole phase).
#[derive(Debug, Deserialize)]
struct ExtractionLlmOutput {
    #[serde(default)]
    facts: Vec<serde_json::Value>,
    #[serde(default)]
    entities: Vec<serde_json::Value>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Runs Phase 2 (spec.md §4.6): basic extraction of facts and entities from
/// the triaged text, assigning sequential ids and dropping malformed
/// records with a warning rather than failing the whole phase.
pub async fn run(
    text: &str,
    title: &str,
    source_type: &str,
    origin_country: &str,
    source_date: &str,
    processor: &mut FragmentProcessor,
    llm: &Arc<dyn LlmClient>,
    prompts: &PromptStore,
    llm_max_tokens: u32,
    llm_temperature: f32,
) -> Phase2Result {
    let mut warnings = Vec::new();

    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert("TITLE", title.to_string());
    values.insert("SOURCE_TYPE", source_type.to_string());
    values.insert("ORIGIN_COUNTRY", origin_country.to_string());
    values.insert("SOURCE_DATE", source_date.to_string());
    values.insert("CONTENT", text.to_string());

    let prompt = match prompts.render("basic_extraction", &values) {
        Ok(p) => p,
        Err(err) => {
            warnings.push(format!("prompt render failed: {err}"));
            return Phase2Result {
                fallback_used: true,
                warnings,
                ..Default::default()
            };
        }
    };

    let request = CompletionRequest {
        messages: vec![ChatMessage::user(prompt)],
        temperature: llm_temperature,
        max_tokens: llm_max_tokens,
    };

    let response = match llm.complete(request).await {
        Ok(r) => r,
        Err(err) => {
            warnings.push(format!("basic extraction LLM call failed: {err}"));
            return Phase2Result {
                fallback_used: true,
                warnings,
                ..Default::default()
            };
        }
    };

    let parsed: ExtractionLlmOutput = match serde_json::from_str(&response.content).or_else(|_| {
        newsgraph_llm::json_repair::repair(&response.content)
            .ok_or(())
            .and_then(|v| serde_json::from_value(v).map_err(|_| ()))
    }) {
        Ok(p) => p,
        Err(_) => {
            warnings.push("basic extraction response was not valid JSON even after repair".to_string());
            return Phase2Result {
                fallback_used: true,
                warnings,
                ..Default::default()
            };
        }
    };

    let mut facts = Vec::with_capacity(parsed.facts.len());
    for raw_value in parsed.facts {
        let raw: LlmFact = match serde_json::from_value(raw_value) {
            Ok(f) => f,
            Err(err) => {
                warnings.push(format!("fact dropped: malformed record ({err})"));
                continue;
            }
        };
        let fact_type: FactType = match raw.fact_type.parse() {
            Ok(t) => t,
            Err(_) => {
                warnings.push(format!("fact dropped: unknown type '{}'", raw.fact_type));
                continue;
            }
        };
        let temporal_precision: TemporalPrecision = match raw.temporal_precision.parse() {
            Ok(t) => t,
            Err(_) => {
                warnings.push(format!(
                    "fact dropped: unknown temporal_precision '{}'",
                    raw.temporal_precision
                ));
                continue;
            }
        };
        if raw.content.trim().is_empty() {
            warnings.push("fact dropped: empty content".to_string());
            continue;
        }
        let occurrence = raw
            .date
            .map(|d| DateRange {
                start: d.start.as_deref().and_then(parse_date),
                end: d.end.as_deref().and_then(parse_date),
            })
            .unwrap_or_default();

        facts.push(Fact {
            id: processor.next_fact_id(),
            content: raw.content,
            occurrence,
            temporal_precision,
            fact_type,
            countries: raw.countries,
            regions: raw.regions,
            cities: raw.cities,
            tags: raw.tags,
            is_future_event: raw.is_future_event,
            scheduling_state: raw.scheduling_state,
            importance: 5,
        });
    }

    let mut entities = Vec::with_capacity(parsed.entities.len());
    for raw_value in parsed.entities {
        let raw: LlmEntity = match serde_json::from_value(raw_value) {
            Ok(e) => e,
            Err(err) => {
                warnings.push(format!("entity dropped: malformed record ({err})"));
                continue;
            }
        };
        let entity_type: EntityType = match raw.entity_type.parse() {
            Ok(t) => t,
            Err(_) => {
                warnings.push(format!("entity dropped: unknown type '{}'", raw.entity_type));
                continue;
            }
        };
        if raw.name.trim().is_empty() {
            warnings.push("entity dropped: empty name".to_string());
            continue;
        }
        let mut entity = Entity::new(processor.next_entity_id(), raw.name, entity_type);
        entity.description = raw.description;
        entity.aliases = raw.aliases;
        entity.birth_date = raw.birth_date.as_deref().and_then(parse_date);
        entity.dissolution_date = raw.dissolution_date.as_deref().and_then(parse_date);
        entities.push(entity);
    }

    Phase2Result {
        facts,
        entities,
        fallback_used: false,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_rejects_malformed_strings() {
        assert!(parse_date("2026-07-28").is_some());
        assert!(parse_date("not-a-date").is_none());
        assert!(parse_date("28/07/2026").is_none());
    }

    #[test]
    fn phase2_default_fallback_carries_no_results() {
        let fallback = Phase2Result {
            fallback_used: true,
            warnings: vec!["boom".into()],
            ..Default::default()
        };
        assert!(fallback.facts.is_empty());
        assert!(fallback.entities.is_empty());
        assert!(fallback.fallback_used);
    }
}
